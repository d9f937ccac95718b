//! Decoding of the 256-word IDENTIFY DEVICE block.

pub const IDENTIFY_WORDS: usize = 256;

const WORD_CYLINDERS: usize = 1;
const WORD_HEADS: usize = 3;
const WORD_SECTORS_PER_TRACK: usize = 6;
const WORD_MODEL: std::ops::Range<usize> = 27..47;
const WORD_CAPABILITIES: usize = 49;
const WORD_LBA28_CAPACITY: usize = 60;
const WORD_COMMAND_SETS: usize = 83;
const WORD_LBA48_CAPACITY: usize = 100;

const CAP_DMA: u16 = 1 << 8;
const CAP_LBA: u16 = 1 << 9;
const CMDSET_LBA48: u16 = 1 << 10;

/// How a drive is addressed, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    Lba48,
    Lba28,
    Chs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyData {
    words: [u16; IDENTIFY_WORDS],
}

impl IdentifyData {
    pub fn new(words: [u16; IDENTIFY_WORDS]) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u16; IDENTIFY_WORDS] {
        &self.words
    }

    /// Model string: two characters per word with the first in the high byte, blank padded.
    pub fn model(&self) -> String {
        let bytes: Vec<u8> = self.words[WORD_MODEL]
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .collect();
        String::from_utf8_lossy(&bytes)
            .trim_matches(|c: char| c == ' ' || c == '\0')
            .to_string()
    }

    pub fn supports_dma(&self) -> bool {
        self.words[WORD_CAPABILITIES] & CAP_DMA != 0
    }

    pub fn supports_lba(&self) -> bool {
        self.words[WORD_CAPABILITIES] & CAP_LBA != 0
    }

    /// Word 83 is only meaningful when bit 14 is set and bit 15 clear.
    pub fn supports_lba48(&self) -> bool {
        let w = self.words[WORD_COMMAND_SETS];
        w & 0xC000 == 0x4000 && w & CMDSET_LBA48 != 0
    }

    pub fn addressing(&self) -> Addressing {
        if self.supports_lba48() {
            Addressing::Lba48
        } else if self.supports_lba() {
            Addressing::Lba28
        } else {
            Addressing::Chs
        }
    }

    pub fn lba28_sectors(&self) -> u64 {
        u64::from(self.words[WORD_LBA28_CAPACITY])
            | (u64::from(self.words[WORD_LBA28_CAPACITY + 1]) << 16)
    }

    pub fn lba48_sectors(&self) -> u64 {
        self.words[WORD_LBA48_CAPACITY..WORD_LBA48_CAPACITY + 4]
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &w)| acc | (u64::from(w) << (16 * i)))
    }

    pub fn chs_sectors(&self) -> u64 {
        u64::from(self.words[WORD_CYLINDERS])
            * u64::from(self.words[WORD_HEADS])
            * u64::from(self.words[WORD_SECTORS_PER_TRACK])
    }

    /// Total addressable sectors under the preferred addressing mode.
    pub fn sectors(&self) -> u64 {
        match self.addressing() {
            Addressing::Lba48 => self.lba48_sectors(),
            Addressing::Lba28 => self.lba28_sectors(),
            Addressing::Chs => self.chs_sectors(),
        }
    }

    /// Capacity in MiB (2048 sectors each).
    pub fn capacity_mb(&self) -> u64 {
        self.sectors() >> 11
    }
}
