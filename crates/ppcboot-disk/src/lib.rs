#![forbid(unsafe_code)]

//! Disks on top of the ATA channel drivers.
//!
//! [`Storage::scan`] turns every active channel into a `wdN` entry, reading IDENTIFY data and
//! the BSD disklabel (found through the boot sector table when there is one). Loaders then
//! open partitions by unit and index and read them through [`Storage::strategy`], which
//! translates partition blocks to disk sectors and refuses anything outside the partition.

mod disk;
mod error;
pub mod fs;
pub mod label;
mod storage;

pub use disk::{Disk, DiskTable, MAX_DISKS};
pub use error::{DiskError, Result};
pub use fs::{BlockSource, FfsV1, FfsV2, FileSystem, FsFormat};
pub use label::{DiskLabel, LabelConfig, Partition, PartitionKind, RAW_PART};
pub use ppcboot_ata::regs::SECTOR_SIZE;
pub use storage::{FileId, OpenPartition, Storage};
