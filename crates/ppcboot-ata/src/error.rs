use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtaError>;

/// Why a bounded status wait gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("no device (status reads all ones)")]
    NoDevice,

    #[error("device reported an error (status {status:#04x}, error {error:#04x})")]
    DeviceError { status: u8, error: u8 },

    #[error("still busy (status {status:#04x})")]
    StillBusy { status: u8 },

    #[error("not ready (status {status:#04x})")]
    NotReady { status: u8 },
}

/// Command phase an [`AtaError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaOp {
    SoftReset,
    Identify,
    SetFeatures,
    CheckPowerMode,
    Read,
}

impl fmt::Display for AtaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SoftReset => "soft reset",
            Self::Identify => "IDENTIFY DEVICE",
            Self::SetFeatures => "SET FEATURES",
            Self::CheckPowerMode => "CHECK POWER MODE",
            Self::Read => "READ SECTORS",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtaError {
    #[error("{op} failed: {source}")]
    Wait {
        op: AtaOp,
        #[source]
        source: WaitError,
    },

    #[error("{op}: device offered no data (status {status:#04x})")]
    NoData { op: AtaOp, status: u8 },

    /// A committed transfer stalled; the request is abandoned.
    #[error("transfer timed out at block {block}: {source}")]
    Timeout {
        block: u64,
        #[source]
        source: WaitError,
    },

    #[error("channel {channel} is not active")]
    ChannelAbsent { channel: usize },

    #[error("buffer of {len} bytes cannot hold {sectors} sectors")]
    BufferTooSmall { len: usize, sectors: u32 },

    #[error("block {block} is beyond what the drive can address")]
    Unsupported { block: u64 },
}
