use crate::disk::SimDisk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPowerState {
    Active,
    Idle,
    Standby,
}

impl SimPowerState {
    /// Sector count register value returned by CHECK POWER MODE.
    pub fn check_power_mode_code(self) -> u8 {
        match self {
            Self::Active => 0xFF,
            Self::Idle => 0x80,
            Self::Standby => 0x00,
        }
    }
}

/// How a drive answers CHECK POWER MODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPowerReply {
    /// The code for its current power state.
    State,
    /// Always this sector count value.
    Code(u8),
    /// Aborts the command.
    Abort,
}

/// An ATA drive attached to a simulated channel.
#[derive(Debug, Clone)]
pub struct SimDrive {
    pub model: String,
    pub disk: SimDisk,
    pub lba: bool,
    pub lba48: bool,
    pub power: SimPowerState,
    pub power_reply: SimPowerReply,
    /// IDLE IMMEDIATE commands needed before a standby drive spins up.
    pub wakes_needed: u32,
    /// Status reads that still report busy after a soft reset is released.
    pub reset_busy_polls: u32,
    /// Status never leaves busy.
    pub stuck_busy: bool,
    wakes_seen: u32,
}

impl SimDrive {
    pub fn new(model: impl Into<String>, disk: SimDisk) -> Self {
        Self {
            model: model.into(),
            disk,
            lba: true,
            lba48: true,
            power: SimPowerState::Active,
            power_reply: SimPowerReply::State,
            wakes_needed: 0,
            reset_busy_polls: 0,
            stuck_busy: false,
            wakes_seen: 0,
        }
    }

    pub fn lba28_only(mut self) -> Self {
        self.lba48 = false;
        self
    }

    /// CHS-only drive (no LBA capability advertised).
    pub fn chs_only(mut self) -> Self {
        self.lba = false;
        self.lba48 = false;
        self
    }

    pub fn in_standby(mut self, wakes_needed: u32) -> Self {
        self.power = SimPowerState::Standby;
        self.wakes_needed = wakes_needed;
        self
    }

    /// Answers every CHECK POWER MODE with `code`, whatever the power state.
    pub fn with_power_code(mut self, code: u8) -> Self {
        self.power_reply = SimPowerReply::Code(code);
        self
    }

    pub fn aborting_power_mode(mut self) -> Self {
        self.power_reply = SimPowerReply::Abort;
        self
    }

    /// Sector count for a CHECK POWER MODE, or `None` when the command is aborted.
    pub fn power_mode_reply(&self) -> Option<u8> {
        match self.power_reply {
            SimPowerReply::State => Some(self.power.check_power_mode_code()),
            SimPowerReply::Code(code) => Some(code),
            SimPowerReply::Abort => None,
        }
    }

    /// Still spinning up: holds busy after a soft reset until enough wake pulses arrive.
    pub fn is_spinning_up(&self) -> bool {
        self.power == SimPowerState::Standby
    }

    pub fn with_reset_busy_polls(mut self, polls: u32) -> Self {
        self.reset_busy_polls = polls;
        self
    }

    pub fn stuck_busy(mut self) -> Self {
        self.stuck_busy = true;
        self
    }

    pub fn wakes_seen(&self) -> u32 {
        self.wakes_seen
    }

    pub(crate) fn wake_pulse(&mut self) {
        self.wakes_seen += 1;
        if self.power != SimPowerState::Active && self.wakes_seen >= self.wakes_needed {
            self.power = SimPowerState::Active;
        }
    }

    /// Cylinders, heads and sectors per track for the disk capacity, capped at the ATA limits.
    pub fn geometry(&self) -> (u16, u16, u16) {
        let heads = 16u16;
        let spt = 63u16;
        let cylinders = (self.disk.sectors() / (u64::from(heads) * u64::from(spt))).min(16383);
        (cylinders as u16, heads, spt)
    }

    pub fn identify_words(&self) -> [u16; 256] {
        let mut id = [0u16; 256];
        id[0] = 0x0040;

        let (cylinders, heads, spt) = self.geometry();
        id[1] = cylinders;
        id[3] = heads;
        id[6] = spt;

        // Two characters per word, first one in the high byte, space padded.
        let mut model = [b' '; 40];
        for (dst, src) in model.iter_mut().zip(self.model.bytes()) {
            *dst = src;
        }
        for (i, pair) in model.chunks_exact(2).enumerate() {
            id[27 + i] = u16::from_be_bytes([pair[0], pair[1]]);
        }

        if self.lba {
            id[49] = (1 << 9) | (1 << 8);
            let lba28 = self.disk.sectors().min(0x0FFF_FFFF) as u32;
            id[60] = lba28 as u16;
            id[61] = (lba28 >> 16) as u16;
        }
        id[64] = 0x0003;
        id[83] = 0x4000;
        if self.lba48 {
            id[83] |= 1 << 10;
            let total = self.disk.sectors();
            for (i, word) in id[100..104].iter_mut().enumerate() {
                *word = (total >> (16 * i)) as u16;
            }
        }
        id
    }
}
