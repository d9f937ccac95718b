//! Address decode of the two storage controller layouts the board can carry.

use std::collections::BTreeMap;

use ppcboot_platform::constants::{LEGACY_IDE_CMD_PORTS, LEGACY_IDE_CTL_PORTS};

use crate::channel::SimChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimLayout {
    /// PCI IDE: command/control blocks in BAR0..3 (or the legacy ports), bus master in BAR4.
    PciIde,
    /// Silicon Image SATA: as PCI IDE for ports 0/1, plus every port and its link registers
    /// in the BAR5 memory window.
    SiiSata,
}

/// Where in a controller an access landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Region {
    Command { channel: usize, offset: u32 },
    Control { channel: usize },
    Link { channel: usize, offset: u32 },
    /// Backed by plain storage (bus master and FIFO registers, chip specifics).
    Scratch { bar: u8, offset: u32 },
}

const SII_TASKFILE: [u32; 4] = [0x080, 0x0C0, 0x280, 0x2C0];
const SII_SCR: [u32; 4] = [0x100, 0x180, 0x300, 0x380];
const SII_CONTROL_OFFSET: u32 = 0x0A;

#[derive(Debug, Clone)]
pub struct SimController {
    layout: SimLayout,
    channels: Vec<SimChannel>,
    scratch: BTreeMap<(u8, u32), u8>,
}

impl SimController {
    pub fn new(layout: SimLayout, channels: Vec<SimChannel>) -> Self {
        Self {
            layout,
            channels,
            scratch: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> SimLayout {
        self.layout
    }

    pub fn channel(&self, index: usize) -> Option<&SimChannel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut SimChannel> {
        self.channels.get_mut(index)
    }

    /// Byte stored at `offset` of BAR `bar` for registers the model does not interpret.
    pub fn scratch_byte(&self, bar: u8, offset: u32) -> u8 {
        self.scratch.get(&(bar, offset)).copied().unwrap_or(0)
    }

    pub(crate) fn decode_bar(&self, bar: u8, offset: u32) -> Region {
        match (bar, offset) {
            (0, 0..=7) => Region::Command { channel: 0, offset },
            (1, 2) => Region::Control { channel: 0 },
            (2, 0..=7) => Region::Command { channel: 1, offset },
            (3, 2) => Region::Control { channel: 1 },
            (5, _) if self.layout == SimLayout::SiiSata => self.decode_sii_mmio(offset),
            _ => Region::Scratch { bar, offset },
        }
    }

    fn decode_sii_mmio(&self, offset: u32) -> Region {
        let ports = self.channels.len().min(SII_TASKFILE.len());
        for channel in 0..ports {
            let tf = SII_TASKFILE[channel];
            if (tf..tf + 8).contains(&offset) {
                return Region::Command {
                    channel,
                    offset: offset - tf,
                };
            }
            if offset == tf + SII_CONTROL_OFFSET {
                return Region::Control { channel };
            }
            let scr = SII_SCR[channel];
            if (scr..scr + 0x10).contains(&offset) {
                return Region::Link {
                    channel,
                    offset: offset - scr,
                };
            }
        }
        Region::Scratch { bar: 5, offset }
    }

    pub(crate) fn decode_legacy_port(port: u32) -> Option<Region> {
        for channel in 0..2 {
            let cmd = u32::from(LEGACY_IDE_CMD_PORTS[channel]);
            if (cmd..cmd + 8).contains(&port) {
                return Some(Region::Command {
                    channel,
                    offset: port - cmd,
                });
            }
            if port == u32::from(LEGACY_IDE_CTL_PORTS[channel]) {
                return Some(Region::Control { channel });
            }
        }
        None
    }

    pub(crate) fn read(&mut self, region: Region, width: u32) -> u32 {
        match region {
            Region::Command { channel, offset } => {
                let Some(ch) = self.channels.get_mut(channel) else {
                    return all_ones(width);
                };
                match (offset, width) {
                    (0, 2) => u32::from(ch.read_data()),
                    (_, 1) => u32::from(ch.read_register(offset)),
                    _ => all_ones(width),
                }
            }
            Region::Control { channel } => self
                .channels
                .get(channel)
                .map_or(all_ones(width), |ch| u32::from(ch.read_alt_status())),
            Region::Link { channel, offset } => self
                .channels
                .get(channel)
                .map_or(all_ones(width), |ch| ch.read_scr(offset)),
            Region::Scratch { bar, offset } => (0..width).fold(0, |acc, i| {
                acc | (u32::from(self.scratch_byte(bar, offset + i)) << (8 * i))
            }),
        }
    }

    pub(crate) fn write(&mut self, region: Region, width: u32, val: u32) {
        match region {
            Region::Command { channel, offset } => {
                if let Some(ch) = self.channels.get_mut(channel) {
                    ch.write_register(offset, val as u8);
                }
            }
            Region::Control { channel } => {
                if let Some(ch) = self.channels.get_mut(channel) {
                    ch.write_control(val as u8);
                }
            }
            Region::Link { channel, offset } => {
                if let Some(ch) = self.channels.get_mut(channel) {
                    ch.write_scr(offset, val);
                }
            }
            Region::Scratch { bar, offset } => {
                for i in 0..width {
                    self.scratch.insert((bar, offset + i), (val >> (8 * i)) as u8);
                }
            }
        }
    }
}

fn all_ones(width: u32) -> u32 {
    match width {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}
