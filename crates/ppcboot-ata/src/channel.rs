//! One channel and the handshakes it goes through.

use ppcboot_platform::{Delay, RegisterIo};
use tracing::{debug, info, warn};

use crate::config::BringUpConfig;
use crate::error::{AtaError, AtaOp, Result, WaitError};
use crate::identify::IDENTIFY_WORDS;
use crate::regs::*;
use crate::wait::{await_ready, soft_reset};
use crate::window::ChannelRegisters;

/// Delay between issuing IDENTIFY and polling for its data.
const IDENTIFY_SETTLE_MS: u32 = 10;
/// Settle time after each SControl write of the link reset sequence.
const LINK_SETTLE_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unprobed,
    Resetting,
    Active,
    Absent,
}

/// CHECK POWER MODE result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Active,
    Idle,
    Standby,
    Unknown(u8),
}

impl PowerMode {
    pub fn from_sector_count(value: u8) -> Self {
        match value {
            ATA_PWR_ACTIVE => Self::Active,
            ATA_PWR_IDLE => Self::Idle,
            ATA_PWR_STANDBY => Self::Standby,
            other => Self::Unknown(other),
        }
    }

    /// The platters are spinning and media access will not stall on spin-up.
    pub fn is_spun_up(self) -> bool {
        matches!(self, Self::Active | Self::Idle)
    }
}

#[derive(Debug)]
pub struct Channel {
    index: usize,
    regs: ChannelRegisters,
    state: ChannelState,
}

impl Channel {
    pub fn new(index: usize, regs: ChannelRegisters) -> Self {
        Self {
            index,
            regs,
            state: ChannelState::Unprobed,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ChannelState::Active
    }

    pub fn registers(&self) -> &ChannelRegisters {
        &self.regs
    }

    pub fn is_sata(&self) -> bool {
        self.regs.is_sata()
    }

    pub(crate) fn require_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(AtaError::ChannelAbsent {
                channel: self.index,
            })
        }
    }

    /// Takes the link through a reset and reports whether a device answered.
    ///
    /// One attempt only; callers decide how often to retry. Channels without link registers
    /// report `false`.
    pub fn sata_presence<B: RegisterIo + Delay + ?Sized>(&self, io: &mut B) -> bool {
        if !self.regs.is_sata() {
            return false;
        }
        self.regs.write_link(io, SCR_CONTROL, SCONTROL_INIT);
        io.delay_ms(LINK_SETTLE_MS);
        self.regs.write_link(io, SCR_CONTROL, SCONTROL_IDLE);
        io.delay_ms(LINK_SETTLE_MS);
        let sstatus = self.regs.read_link(io, SCR_STATUS).unwrap_or(0);
        debug!(channel = self.index, sstatus = format_args!("{sstatus:#x}"), "SATA link");
        sstatus & SSTATUS_DET_PRESENT == SSTATUS_DET_PRESENT
    }

    pub fn soft_reset<B: RegisterIo + Delay + ?Sized>(&self, io: &mut B, budget_ms: u32) -> Result<()> {
        soft_reset(io, &self.regs, budget_ms)
    }

    pub fn check_power_mode<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        budget_ms: u32,
    ) -> Result<PowerMode> {
        self.regs.write_reg(io, ATA_REG_DEVICE, ATA_DEV_MASTER);
        self.regs.command(io, ATA_CMD_CHECK_POWER_MODE);
        await_ready(io, &self.regs, budget_ms).map_err(|source| AtaError::Wait {
            op: AtaOp::CheckPowerMode,
            source,
        })?;
        Ok(PowerMode::from_sector_count(
            self.regs.read_reg(io, ATA_REG_SECTOR_COUNT),
        ))
    }

    /// IDLE IMMEDIATE: asks a drive in standby to spin up. Completion is not awaited.
    pub fn wake_pulse<B: RegisterIo + ?Sized>(&self, io: &mut B) {
        self.regs.write_reg(io, ATA_REG_DEVICE, ATA_DEV_MASTER);
        self.regs.command(io, ATA_CMD_IDLE_IMMEDIATE);
    }

    /// Runs IDENTIFY DEVICE and drains the result into `buf`.
    pub fn identify<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        buf: &mut [u16; IDENTIFY_WORDS],
        budget_ms: u32,
    ) -> Result<()> {
        self.regs.write_reg(io, ATA_REG_DEVICE, ATA_DEV_MASTER);
        self.regs.command(io, ATA_CMD_IDENTIFY);
        io.delay_ms(IDENTIFY_SETTLE_MS);

        let status = await_ready(io, &self.regs, budget_ms).map_err(|source| AtaError::Wait {
            op: AtaOp::Identify,
            source,
        })?;
        if !status.contains(AtaStatus::DRQ) {
            return Err(AtaError::NoData {
                op: AtaOp::Identify,
                status: status.bits(),
            });
        }
        for word in buf.iter_mut() {
            *word = self.regs.read_data(io);
        }
        // Clears the completion.
        self.regs.status(io);
        Ok(())
    }

    /// SET FEATURES to the conservative PIO mode the read path is written for.
    pub fn set_pio_mode<B: RegisterIo + Delay + ?Sized>(&self, io: &mut B, budget_ms: u32) -> Result<()> {
        self.regs.write_reg(io, ATA_REG_ERROR_FEATURES, SETFEATURES_XFER);
        self.regs.write_reg(io, ATA_REG_SECTOR_COUNT, XFER_PIO_0);
        self.regs.write_reg(io, ATA_REG_DEVICE, ATA_DEV_MASTER);
        self.regs.command(io, ATA_CMD_SET_FEATURES);
        await_ready(io, &self.regs, budget_ms)
            .map(|_| ())
            .map_err(|source| AtaError::Wait {
                op: AtaOp::SetFeatures,
                source,
            })
    }

    /// Presence check, spin-up and reset. Leaves the channel `Active` or `Absent`.
    pub fn bring_up<B: RegisterIo + Delay + ?Sized>(
        &mut self,
        io: &mut B,
        cfg: &BringUpConfig,
        present: bool,
    ) -> ChannelState {
        if !present {
            debug!(channel = self.index, "no device");
            self.state = ChannelState::Absent;
            return self.state;
        }
        self.state = ChannelState::Resetting;

        let (wake_retries, reset_tries) = if self.is_sata() {
            (cfg.sata_wake_retries, cfg.sata_reset_retries)
        } else {
            (cfg.pata_wake_retries, 1)
        };

        let up = match self.check_power_mode(io, cfg.reset_budget_ms) {
            Err(AtaError::Wait {
                source: WaitError::NoDevice,
                ..
            }) => false,
            Ok(mode) if mode.is_spun_up() => {
                (0..reset_tries).any(|_| self.soft_reset(io, cfg.reset_budget_ms).is_ok())
            }
            mode => {
                info!(channel = self.index, ?mode, "waiting for drive to spin up");
                self.spin_up(io, cfg, wake_retries)
            }
        };

        self.state = if up {
            ChannelState::Active
        } else {
            warn!(channel = self.index, "drive did not come up");
            ChannelState::Absent
        };
        self.state
    }

    /// Wake pulse then soft reset, until a reset completes or `retries` run out.
    ///
    /// Only a completed reset counts. The power mode read afterwards is logged and nothing
    /// more; drives may abort CHECK POWER MODE or answer with codes outside the classic three.
    fn spin_up<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        cfg: &BringUpConfig,
        retries: u32,
    ) -> bool {
        for attempt in 0..retries {
            self.wake_pulse(io);
            io.delay_ms(cfg.wake_interval_ms);
            if self.soft_reset(io, cfg.reset_budget_ms).is_ok() {
                let mode = self.check_power_mode(io, cfg.reset_budget_ms).ok();
                debug!(channel = self.index, attempt, ?mode, "drive answered reset");
                return true;
            }
        }
        false
    }
}
