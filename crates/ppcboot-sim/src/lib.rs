#![forbid(unsafe_code)]

//! Host-side model of a NAS board for exercising the storage stack without hardware.
//!
//! [`SimBoard`] implements the platform traits over an in-memory PCI configuration space
//! (BAR sizing, bridges forwarding bus numbers), storage controllers decoded through their
//! programmed windows, and a virtual clock advanced only by delays. Each channel keeps a
//! [`SimCommand`] log so tests can observe what the driver issued.

mod board;
mod channel;
mod clock;
mod config;
mod controller;
mod disk;
mod drive;
mod error;

pub use board::{SimBoard, SimConfigAccess, SimFunction, SII_VENDOR_ID};
pub use channel::{SimChannel, SimCommand};
pub use clock::SimClock;
pub use config::{SimBar, SimConfigSpace};
pub use controller::{SimController, SimLayout};
pub use disk::{SimDisk, SECTOR_SIZE};
pub use drive::{SimDrive, SimPowerReply, SimPowerState};
pub use error::{Result, SimError};
