use ppcboot_ata::AtaError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiskError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiskError {
    #[error("no disk unit {unit}")]
    NoSuchUnit { unit: usize },

    #[error("unit {unit} has no partition {partition}")]
    NoSuchPartition { unit: usize, partition: u8 },

    #[error("{disk}: no disklabel")]
    NoLabel { disk: String },

    #[error("{disk}: read error at block {block}: {source}")]
    Io {
        disk: String,
        block: u64,
        #[source]
        source: AtaError,
    },

    #[error("unaligned buffer length {len} (expected multiple of {alignment})")]
    UnalignedLength { len: usize, alignment: usize },

    #[error("out of bounds: block={block} count={count} size={size}")]
    OutOfBounds { block: u64, count: u64, size: u64 },

    #[error("no filesystem reader recognised the partition")]
    FormatMismatch,

    #[error("disk table full ({capacity} entries)")]
    TableFull { capacity: usize },

    #[error("file is not open")]
    NotOpen,
}
