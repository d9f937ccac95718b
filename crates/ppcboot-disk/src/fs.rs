//! Filesystem readers tried when a partition is opened.
//!
//! Only superblock recognition lives here; what a reader does after mounting belongs to the
//! loader that owns the open file.

use std::fmt;

use crate::error::{DiskError, Result};
use crate::SECTOR_SIZE;

/// Block reads relative to the start of an open partition.
pub trait BlockSource {
    /// Fills `buf` (a whole number of sectors) starting at partition block `block`.
    fn read_blocks(&mut self, block: u64, buf: &mut [u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsFormat {
    FfsV2,
    FfsV1,
}

impl fmt::Display for FsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FfsV2 => "ffsv2",
            Self::FfsV1 => "ffsv1",
        })
    }
}

pub trait FileSystem {
    fn format(&self) -> FsFormat;

    /// Returns [`DiskError::FormatMismatch`] when the partition does not hold this format.
    fn probe(&self, src: &mut dyn BlockSource) -> Result<()>;
}

pub const FS_UFS2_MAGIC: u32 = 0x1954_0119;
pub const FS_UFS1_MAGIC: u32 = 0x0001_1954;
pub const SBLOCK_UFS2: u64 = 65536;
pub const SBLOCK_UFS1: u64 = 8192;
/// Offset of the magic word inside the superblock.
const FS_MAGIC_OFFSET: usize = 1372;

#[derive(Debug, Clone, Copy, Default)]
pub struct FfsV2;

#[derive(Debug, Clone, Copy, Default)]
pub struct FfsV1;

impl FileSystem for FfsV2 {
    fn format(&self) -> FsFormat {
        FsFormat::FfsV2
    }

    fn probe(&self, src: &mut dyn BlockSource) -> Result<()> {
        probe_superblock(src, SBLOCK_UFS2, FS_UFS2_MAGIC)
    }
}

impl FileSystem for FfsV1 {
    fn format(&self) -> FsFormat {
        FsFormat::FfsV1
    }

    fn probe(&self, src: &mut dyn BlockSource) -> Result<()> {
        probe_superblock(src, SBLOCK_UFS1, FS_UFS1_MAGIC)
    }
}

/// Readers in the order they are tried: newest format first.
pub fn default_readers() -> [&'static dyn FileSystem; 2] {
    [&FfsV2, &FfsV1]
}

fn probe_superblock(src: &mut dyn BlockSource, sb_offset: u64, magic: u32) -> Result<()> {
    let sectors = (FS_MAGIC_OFFSET + 4).div_ceil(SECTOR_SIZE);
    let mut buf = vec![0u8; sectors * SECTOR_SIZE];
    match src.read_blocks(sb_offset / SECTOR_SIZE as u64, &mut buf) {
        Ok(()) => {}
        // Too small to hold this superblock.
        Err(DiskError::OutOfBounds { .. }) => return Err(DiskError::FormatMismatch),
        Err(e) => return Err(e),
    }
    let raw = [
        buf[FS_MAGIC_OFFSET],
        buf[FS_MAGIC_OFFSET + 1],
        buf[FS_MAGIC_OFFSET + 2],
        buf[FS_MAGIC_OFFSET + 3],
    ];
    if u32::from_be_bytes(raw) == magic || u32::from_le_bytes(raw) == magic {
        Ok(())
    } else {
        Err(DiskError::FormatMismatch)
    }
}

/// Tries each reader in turn, moving on only when a reader reports a format mismatch.
pub fn detect(readers: &[&dyn FileSystem], src: &mut dyn BlockSource) -> Result<FsFormat> {
    for reader in readers {
        match reader.probe(src) {
            Ok(()) => return Ok(reader.format()),
            Err(DiskError::FormatMismatch) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(DiskError::FormatMismatch)
}
