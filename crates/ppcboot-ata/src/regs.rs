//! Task file layout, status bits and command opcodes.

use bitflags::bitflags;

pub const ATA_REG_DATA: u32 = 0;
pub const ATA_REG_ERROR_FEATURES: u32 = 1;
pub const ATA_REG_SECTOR_COUNT: u32 = 2;
pub const ATA_REG_LBA0: u32 = 3;
pub const ATA_REG_LBA1: u32 = 4;
pub const ATA_REG_LBA2: u32 = 5;
pub const ATA_REG_DEVICE: u32 = 6;
pub const ATA_REG_STATUS_COMMAND: u32 = 7;

/// Bytes decoded by one command block.
pub const ATA_COMMAND_BLOCK_LEN: u32 = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AtaStatus: u8 {
        const BSY = 0x80;
        const DRDY = 0x40;
        const DF = 0x20;
        const DSC = 0x10;
        const DRQ = 0x08;
        const CORR = 0x04;
        const IDX = 0x02;
        const ERR = 0x01;
    }
}

impl AtaStatus {
    /// A floating bus with nothing attached reads all ones.
    pub fn is_floating(self) -> bool {
        self.bits() == 0xFF
    }
}

pub const ATA_CTRL_NIEN: u8 = 0x02;
pub const ATA_CTRL_SRST: u8 = 0x04;

/// Device register value selecting the master drive (obsolete bits set).
pub const ATA_DEV_MASTER: u8 = 0xA0;
/// Device register LBA mode bit.
pub const ATA_DEV_LBA: u8 = 0x40;

pub const ATA_CMD_READ_SECTORS: u8 = 0x20;
pub const ATA_CMD_READ_SECTORS_EXT: u8 = 0x24;
pub const ATA_CMD_IDLE_IMMEDIATE: u8 = 0xE1;
pub const ATA_CMD_CHECK_POWER_MODE: u8 = 0xE5;
pub const ATA_CMD_IDENTIFY: u8 = 0xEC;
pub const ATA_CMD_SET_FEATURES: u8 = 0xEF;

/// SET FEATURES subcommand: set transfer mode from the sector count register.
pub const SETFEATURES_XFER: u8 = 0x03;
/// Transfer mode value for PIO default mode with flow control (PIO0).
pub const XFER_PIO_0: u8 = 0x08;

/// CHECK POWER MODE results in the sector count register.
pub const ATA_PWR_ACTIVE: u8 = 0xFF;
pub const ATA_PWR_IDLE: u8 = 0x80;
pub const ATA_PWR_STANDBY: u8 = 0x00;

/// Serial ATA status/control register offsets within a port's link block.
pub const SCR_STATUS: u32 = 0x0;
pub const SCR_ERROR: u32 = 0x4;
pub const SCR_CONTROL: u32 = 0x8;
pub const SCR_BLOCK_LEN: u32 = 0x10;

/// SControl: no speed limit, partial/slumber disabled, DET=1 (start interface init).
pub const SCONTROL_INIT: u32 = 0x301;
/// SControl with DET released.
pub const SCONTROL_IDLE: u32 = 0x300;
/// SStatus DET: device detected (bit 0) and phy communication established (bit 1).
pub const SSTATUS_DET_PRESENT: u32 = 0x3;

pub const SECTOR_SIZE: usize = 512;
