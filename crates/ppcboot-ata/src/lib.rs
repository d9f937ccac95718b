#![forbid(unsafe_code)]

//! ATA/SATA channel drivers.
//!
//! [`discover`] finds the storage functions the bus walker left configured, matches each
//! against the chip table ([`ChipFamily`]), resolves the channel register blocks and takes
//! every channel through presence check, spin-up and soft reset. What comes out is a list of
//! [`Controller`]s whose active channels accept IDENTIFY and sector reads.
//!
//! Everything is polled; waits are bounded busy loops on the board's [`Delay`].
//!
//! [`Delay`]: ppcboot_platform::Delay

mod channel;
mod chips;
pub mod config;
mod controller;
mod error;
mod identify;
mod pio;
pub mod regs;
mod wait;
mod window;

pub use channel::{Channel, ChannelState, PowerMode};
pub use chips::{ChipFamily, IdeChip, SiiChip};
pub use config::BringUpConfig;
pub use controller::{discover, Controller, MAX_CHANNELS, MAX_CONTROLLERS};
pub use error::{AtaError, AtaOp, Result, WaitError};
pub use identify::{Addressing, IdentifyData, IDENTIFY_WORDS};
pub use pio::{plan_reads, read_sectors, ReadChunk, LBA28_LIMIT, LBA48_LIMIT, MAX_SECTORS_PER_COMMAND};
pub use wait::{await_ready, soft_reset};
pub use window::{ChannelRegisters, LegacyIdePorts, RegisterWindow, ResolvedBars, WindowCarver};
