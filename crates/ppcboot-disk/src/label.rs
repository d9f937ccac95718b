//! Boot sector and BSD disklabel decoding.

use std::fmt;

use crate::SECTOR_SIZE;

/// Legacy boot sector signature bytes at offset 510.
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];
const MBR_PARTITION_TABLE: usize = 446;
const MBR_PARTITION_ENTRIES: usize = 4;
const MBR_ENTRY_SIZE: usize = 16;

/// Partition type of the native slice in the boot sector table.
pub const NETBSD_PARTITION_TYPE: u8 = 0xA9;

pub const DISKMAGIC: u32 = 0x8256_4557;
pub const MAXPARTITIONS: usize = 16;
/// Partition index that always means the whole disk.
pub const RAW_PART: u8 = 2;

const LABEL_MAGIC2: usize = 132;
const LABEL_NPARTITIONS: usize = 138;
const LABEL_PARTITIONS: usize = 148;
const PARTITION_ENTRY_SIZE: usize = 16;

pub const FS_UNUSED: u8 = 0;
pub const FS_SWAP: u8 = 1;
pub const FS_BSDFFS: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConfig {
    /// Boot sector table type whose slice holds the label.
    pub partition_type: u8,
    /// Sector of the label relative to the slice start.
    pub label_sector: u64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            partition_type: NETBSD_PARTITION_TYPE,
            label_sector: 1,
        }
    }
}

/// Start of the slice carrying the label: the first boot sector table entry of the platform
/// type, or sector 0 when there is no valid boot sector or no such entry.
pub fn label_origin(sector0: &[u8], partition_type: u8) -> u64 {
    if sector0.len() < SECTOR_SIZE || sector0[510..512] != MBR_SIGNATURE {
        return 0;
    }
    sector0[MBR_PARTITION_TABLE..MBR_PARTITION_TABLE + MBR_PARTITION_ENTRIES * MBR_ENTRY_SIZE]
        .chunks_exact(MBR_ENTRY_SIZE)
        .find(|entry| entry[4] == partition_type)
        .map_or(0, |entry| {
            u64::from(u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn u32_at(self, buf: &[u8], off: usize) -> u32 {
        let b = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];
        match self {
            Self::Big => u32::from_be_bytes(b),
            Self::Little => u32::from_le_bytes(b),
        }
    }

    fn u16_at(self, buf: &[u8], off: usize) -> u16 {
        let b = [buf[off], buf[off + 1]];
        match self {
            Self::Big => u16::from_be_bytes(b),
            Self::Little => u16::from_le_bytes(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Absolute start sector.
    pub offset: u64,
    pub size: u64,
    pub fstype: u8,
}

impl Partition {
    pub fn is_used(&self) -> bool {
        self.fstype != FS_UNUSED && self.size != 0
    }

    pub fn kind(&self) -> PartitionKind {
        match self.fstype {
            FS_SWAP => PartitionKind::Swap,
            FS_BSDFFS => PartitionKind::Ffs,
            other => PartitionKind::Foreign(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Swap,
    Ffs,
    Foreign(u8),
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swap => f.write_str("swap"),
            Self::Ffs => f.write_str("ffs"),
            Self::Foreign(t) => write!(f, "foreign (type {t})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskLabel {
    pub byte_order: ByteOrder,
    pub partitions: Vec<Partition>,
}

impl DiskLabel {
    /// Scans `sector` at 4-byte steps for both magic words in either byte order.
    pub fn find(sector: &[u8]) -> Option<Self> {
        let mut off = 0;
        while off + LABEL_PARTITIONS <= sector.len() {
            if let Some(label) = Self::parse_at(sector, off) {
                return Some(label);
            }
            off += 4;
        }
        None
    }

    fn parse_at(buf: &[u8], off: usize) -> Option<Self> {
        let order = [ByteOrder::Big, ByteOrder::Little].into_iter().find(|&o| {
            o.u32_at(buf, off) == DISKMAGIC && o.u32_at(buf, off + LABEL_MAGIC2) == DISKMAGIC
        })?;
        let count = usize::from(order.u16_at(buf, off + LABEL_NPARTITIONS));
        let table = off + LABEL_PARTITIONS;
        if count > MAXPARTITIONS || table + count * PARTITION_ENTRY_SIZE > buf.len() {
            return None;
        }
        let partitions = buf[table..table + count * PARTITION_ENTRY_SIZE]
            .chunks_exact(PARTITION_ENTRY_SIZE)
            .map(|p| Partition {
                size: u64::from(order.u32_at(p, 0)),
                offset: u64::from(order.u32_at(p, 4)),
                fstype: p[12],
            })
            .collect();
        Some(Self {
            byte_order: order,
            partitions,
        })
    }

    pub fn partition(&self, index: u8) -> Option<&Partition> {
        self.partitions.get(usize::from(index))
    }
}

/// Letter naming partition `index` (`a`, `b`, ...).
pub fn partition_letter(index: usize) -> char {
    char::from(b'a' + (index as u8 % 26))
}
