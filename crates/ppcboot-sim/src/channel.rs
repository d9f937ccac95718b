//! One ATA channel: task file, data FIFO, soft reset and (for SATA ports) the link registers.

use std::collections::VecDeque;

use tracing::trace;

use crate::drive::SimDrive;

const STATUS_BSY: u8 = 0x80;
const STATUS_DRDY: u8 = 0x40;
const STATUS_DRQ: u8 = 0x08;
const STATUS_ERR: u8 = 0x01;

const ERROR_ABRT: u8 = 0x04;
const ERROR_IDNF: u8 = 0x10;

const CONTROL_SRST: u8 = 0x04;
const CONTROL_HOB: u8 = 0x80;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_READ_SECTORS_EXT: u8 = 0x24;
const CMD_IDLE_IMMEDIATE: u8 = 0xE1;
const CMD_CHECK_POWER_MODE: u8 = 0xE5;
const CMD_IDENTIFY: u8 = 0xEC;
const CMD_SET_FEATURES: u8 = 0xEF;

const SCR_SSTATUS: u32 = 0x0;
const SCR_SERROR: u32 = 0x4;
const SCR_SCONTROL: u32 = 0x8;

/// SStatus once a gen1 link is up and active.
const SSTATUS_LINK_UP: u32 = 0x113;
/// SStatus with a device detected but no phy communication.
const SSTATUS_NO_PHY: u32 = 0x001;

/// Everything the host did to the channel, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    SoftReset,
    LinkReset,
    Identify,
    SetFeatures { feature: u8, count: u8 },
    CheckPowerMode,
    IdleImmediate,
    Read { lba: u64, count: u32, ext: bool },
    Other(u8),
}

/// Two-deep shadow register: every write pushes the previous value into the HOB slot.
#[derive(Debug, Clone, Copy, Default)]
struct Shadow {
    cur: u8,
    hob: u8,
}

impl Shadow {
    fn write(&mut self, val: u8) {
        self.hob = self.cur;
        self.cur = val;
    }

    fn read(&self, hob: bool) -> u8 {
        if hob {
            self.hob
        } else {
            self.cur
        }
    }
}

#[derive(Debug, Clone)]
struct SimLink {
    scontrol: u32,
    sstatus: u32,
    serror: u32,
    failing_inits: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingRead {
    next: u64,
    remaining: u32,
}

#[derive(Debug, Clone)]
pub struct SimChannel {
    drive: Option<SimDrive>,
    link: Option<SimLink>,
    features: Shadow,
    nsect: Shadow,
    lba_low: Shadow,
    lba_mid: Shadow,
    lba_high: Shadow,
    device: u8,
    control: u8,
    status: u8,
    error: u8,
    busy_reads: u32,
    /// Set when a soft reset is released on a drive that has not spun up yet.
    spinning_up: bool,
    data: VecDeque<u16>,
    pending: Option<PendingRead>,
    log: Vec<SimCommand>,
}

impl SimChannel {
    /// Parallel ATA channel.
    pub fn pata(drive: Option<SimDrive>) -> Self {
        let status = if drive.is_some() { STATUS_DRDY } else { 0 };
        Self {
            drive,
            link: None,
            features: Shadow::default(),
            nsect: Shadow::default(),
            lba_low: Shadow::default(),
            lba_mid: Shadow::default(),
            lba_high: Shadow::default(),
            device: 0,
            control: 0,
            status,
            error: 0,
            busy_reads: 0,
            spinning_up: false,
            data: VecDeque::new(),
            pending: None,
            log: Vec::new(),
        }
    }

    /// Serial ATA port. The link comes up at power-on when a drive is attached.
    pub fn sata(drive: Option<SimDrive>) -> Self {
        let sstatus = if drive.is_some() { SSTATUS_LINK_UP } else { 0 };
        let mut channel = Self::pata(drive);
        channel.link = Some(SimLink {
            scontrol: 0x300,
            sstatus,
            serror: 0,
            failing_inits: 0,
        });
        channel
    }

    /// The next `count` link initialisations end with a device seen but no phy.
    pub fn with_failing_link_inits(mut self, count: u32) -> Self {
        if let Some(link) = self.link.as_mut() {
            link.failing_inits = count;
        }
        self
    }

    pub fn drive(&self) -> Option<&SimDrive> {
        self.drive.as_ref()
    }

    pub fn drive_mut(&mut self) -> Option<&mut SimDrive> {
        self.drive.as_mut()
    }

    pub fn commands(&self) -> &[SimCommand] {
        &self.log
    }

    pub fn clear_commands(&mut self) {
        self.log.clear();
    }

    fn reachable(&self) -> bool {
        self.drive.is_some()
            && self
                .link
                .as_ref()
                .map_or(true, |link| link.sstatus & 0xF == 0x3)
    }

    pub(crate) fn read_register(&mut self, offset: u32) -> u8 {
        let hob = self.control & CONTROL_HOB != 0;
        match offset {
            0 => 0xFF,
            1 => self.error,
            2 => self.nsect.read(hob),
            3 => self.lba_low.read(hob),
            4 => self.lba_mid.read(hob),
            5 => self.lba_high.read(hob),
            6 => self.device,
            7 => self.read_status(),
            _ => 0xFF,
        }
    }

    pub(crate) fn write_register(&mut self, offset: u32, val: u8) {
        self.control &= !CONTROL_HOB;
        match offset {
            1 => self.features.write(val),
            2 => self.nsect.write(val),
            3 => self.lba_low.write(val),
            4 => self.lba_mid.write(val),
            5 => self.lba_high.write(val),
            6 => self.device = val,
            7 => self.execute(val),
            _ => trace!(offset, val, "write to unmodelled task file register"),
        }
    }

    fn read_status(&mut self) -> u8 {
        if !self.reachable() {
            return 0xFF;
        }
        if self.held_busy() {
            return STATUS_BSY;
        }
        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            return STATUS_BSY;
        }
        self.status
    }

    pub(crate) fn read_alt_status(&self) -> u8 {
        if !self.reachable() {
            return 0xFF;
        }
        if self.held_busy() || self.busy_reads > 0 {
            return STATUS_BSY;
        }
        self.status
    }

    fn held_busy(&self) -> bool {
        self.control & CONTROL_SRST != 0
            || self.drive.as_ref().is_some_and(|d| {
                d.stuck_busy || (self.spinning_up && d.is_spinning_up())
            })
    }

    pub(crate) fn write_control(&mut self, val: u8) {
        let was_reset = self.control & CONTROL_SRST != 0;
        self.control = val;
        let in_reset = val & CONTROL_SRST != 0;
        if in_reset && !was_reset {
            self.log.push(SimCommand::SoftReset);
        } else if was_reset && !in_reset {
            self.reset_task_file();
        }
    }

    fn reset_task_file(&mut self) {
        self.data.clear();
        self.pending = None;
        self.error = 0x01;
        self.nsect = Shadow { cur: 1, hob: 0 };
        self.lba_low = Shadow { cur: 1, hob: 0 };
        self.lba_mid = Shadow::default();
        self.lba_high = Shadow::default();
        self.device = 0;
        match self.drive.as_ref() {
            Some(drive) => {
                self.status = STATUS_DRDY;
                self.busy_reads = drive.reset_busy_polls;
                self.spinning_up = drive.is_spinning_up();
            }
            None => {
                self.status = 0;
                self.spinning_up = false;
            }
        }
    }

    pub(crate) fn read_data(&mut self) -> u16 {
        let Some(word) = self.data.pop_front() else {
            return 0xFFFF;
        };
        if self.data.is_empty() {
            self.load_next_sector();
        }
        word
    }

    fn execute(&mut self, command: u8) {
        if !self.reachable() {
            return;
        }
        self.error = 0;
        self.data.clear();
        self.pending = None;
        self.status = STATUS_DRDY;

        match command {
            CMD_IDENTIFY => {
                self.log.push(SimCommand::Identify);
                if let Some(drive) = self.drive.as_ref() {
                    self.data.extend(drive.identify_words());
                    self.status = STATUS_DRDY | STATUS_DRQ;
                }
            }
            CMD_SET_FEATURES => self.log.push(SimCommand::SetFeatures {
                feature: self.features.cur,
                count: self.nsect.cur,
            }),
            CMD_CHECK_POWER_MODE => {
                self.log.push(SimCommand::CheckPowerMode);
                match self.drive.as_ref().map(SimDrive::power_mode_reply) {
                    Some(Some(code)) => self.nsect.cur = code,
                    Some(None) => {
                        self.status = STATUS_DRDY | STATUS_ERR;
                        self.error = ERROR_ABRT;
                    }
                    None => {}
                }
            }
            CMD_IDLE_IMMEDIATE => {
                self.log.push(SimCommand::IdleImmediate);
                if let Some(drive) = self.drive.as_mut() {
                    drive.wake_pulse();
                }
            }
            CMD_READ_SECTORS => {
                let lba = (u64::from(self.device & 0x0F) << 24)
                    | (u64::from(self.lba_high.cur) << 16)
                    | (u64::from(self.lba_mid.cur) << 8)
                    | u64::from(self.lba_low.cur);
                let count = match self.nsect.cur {
                    0 => 256,
                    n => u32::from(n),
                };
                self.start_read(lba, count, false);
            }
            CMD_READ_SECTORS_EXT => {
                let lba = (u64::from(self.lba_high.hob) << 40)
                    | (u64::from(self.lba_mid.hob) << 32)
                    | (u64::from(self.lba_low.hob) << 24)
                    | (u64::from(self.lba_high.cur) << 16)
                    | (u64::from(self.lba_mid.cur) << 8)
                    | u64::from(self.lba_low.cur);
                let count = match u32::from(self.nsect.hob) << 8 | u32::from(self.nsect.cur) {
                    0 => 65536,
                    n => n,
                };
                self.start_read(lba, count, true);
            }
            other => {
                self.log.push(SimCommand::Other(other));
                self.status = STATUS_DRDY | STATUS_ERR;
                self.error = ERROR_ABRT;
            }
        }
    }

    fn start_read(&mut self, lba: u64, count: u32, ext: bool) {
        self.log.push(SimCommand::Read { lba, count, ext });
        let sectors = self.drive.as_ref().map_or(0, |d| d.disk.sectors());
        if lba + u64::from(count) > sectors {
            self.status = STATUS_DRDY | STATUS_ERR;
            self.error = ERROR_IDNF;
            return;
        }
        self.pending = Some(PendingRead {
            next: lba,
            remaining: count,
        });
        self.load_next_sector();
    }

    fn load_next_sector(&mut self) {
        let sector = match (self.pending.as_mut(), self.drive.as_ref()) {
            (Some(pending), Some(drive)) if pending.remaining > 0 => {
                let sector = drive.disk.read_sector(pending.next);
                pending.next += 1;
                pending.remaining -= 1;
                sector
            }
            _ => None,
        };
        match sector {
            Some(bytes) => {
                self.data.extend(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
                );
                self.status = STATUS_DRDY | STATUS_DRQ;
            }
            None => {
                self.pending = None;
                self.status = STATUS_DRDY;
            }
        }
    }

    pub(crate) fn read_scr(&self, offset: u32) -> u32 {
        let Some(link) = self.link.as_ref() else {
            return 0xFFFF_FFFF;
        };
        match offset {
            SCR_SSTATUS => link.sstatus,
            SCR_SERROR => link.serror,
            SCR_SCONTROL => link.scontrol,
            _ => 0,
        }
    }

    pub(crate) fn write_scr(&mut self, offset: u32, val: u32) {
        let has_drive = self.drive.is_some();
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match offset {
            SCR_SERROR => link.serror &= !val,
            SCR_SCONTROL => {
                let was_init = link.scontrol & 0xF == 0x1;
                link.scontrol = val;
                if val & 0xF == 0x1 {
                    link.sstatus = 0;
                    self.log.push(SimCommand::LinkReset);
                } else if was_init {
                    link.sstatus = if !has_drive {
                        0
                    } else if link.failing_inits > 0 {
                        link.failing_inits -= 1;
                        SSTATUS_NO_PHY
                    } else {
                        SSTATUS_LINK_UP
                    };
                }
            }
            _ => {}
        }
    }
}
