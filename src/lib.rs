#![forbid(unsafe_code)]

//! Hardware discovery and storage I/O for a stand-alone PowerPC boot loader.
//!
//! [`BootContext`] owns the board and everything discovered on it. [`BootContext::probe`]
//! runs the boot path once: walk the PCI bus and place windows, match and bring up the
//! storage controllers, then scan their drives into the disk table. The loader afterwards
//! opens partitions and reads them through the context.
//!
//! The pieces live in their own crates and are re-exported here:
//! [`pci`], [`ata`], [`disk`] and [`platform`].

mod config;
mod context;
mod error;

pub use config::BootConfig;
pub use context::BootContext;
pub use error::{BootError, Result};

pub use ppcboot_ata as ata;
pub use ppcboot_disk as disk;
pub use ppcboot_pci as pci;
pub use ppcboot_platform as platform;
