use std::collections::BTreeMap;

use ppcboot_platform::constants::PCI_IO_CPU_BASE;
use ppcboot_platform::{Delay, PciConfigAccess, PciTag, RegisterIo};
use tracing::trace;

use crate::channel::SimChannel;
use crate::clock::SimClock;
use crate::config::{SimBar, SimConfigSpace};
use crate::controller::{Region, SimController, SimLayout};
use crate::drive::SimDrive;
use crate::error::{Result, SimError};

/// Size of the CPU window onto PCI I/O space.
const PCI_IO_CPU_SPAN: u32 = 0x00C0_0000;

const COMMAND_IO: u16 = 0x1;
const COMMAND_MEM: u16 = 0x2;

/// Vendor id of Silicon Image.
pub const SII_VENDOR_ID: u16 = 0x1095;

/// One PCI function of the simulated board.
#[derive(Debug, Clone)]
pub struct SimFunction {
    config: SimConfigSpace,
    controller: Option<SimController>,
}

impl SimFunction {
    pub fn new(vendor_id: u16, device_id: u16, class: u8, subclass: u8, interface: u8) -> Self {
        let mut config = SimConfigSpace::new(vendor_id, device_id);
        config.set_class(class, subclass, interface, 0x01);
        Self {
            config,
            controller: None,
        }
    }

    pub fn with_bar(mut self, index: u8, bar: SimBar) -> Self {
        self.config.set_bar(index, bar);
        self
    }

    pub fn multifunction(mut self) -> Self {
        let header = self.config.header_type();
        self.config.set_header_type(header | 0x80);
        self
    }

    /// PCI-to-PCI bridge.
    pub fn bridge(vendor_id: u16, device_id: u16) -> Self {
        let mut function = Self::new(vendor_id, device_id, 0x06, 0x04, 0x00);
        function.config.set_header_type(0x01);
        function
    }

    /// PCI IDE controller with two channels. `interface` decides, per channel, between native
    /// BARs and the legacy ports.
    pub fn pci_ide(
        vendor_id: u16,
        device_id: u16,
        interface: u8,
        drives: [Option<SimDrive>; 2],
    ) -> Self {
        let channels = drives.into_iter().map(SimChannel::pata).collect();
        Self::new(vendor_id, device_id, 0x01, 0x01, interface)
            .with_taskfile_bars()
            .with_controller(SimController::new(SimLayout::PciIde, channels))
    }

    /// Silicon Image SATA controller; one port per entry of `drives` (two or four).
    pub fn sii_sata(device_id: u16, drives: Vec<Option<SimDrive>>) -> Self {
        let mmio_size = if drives.len() > 2 { 0x400 } else { 0x200 };
        let channels = drives.into_iter().map(SimChannel::sata).collect();
        Self::new(SII_VENDOR_ID, device_id, 0x01, 0x80, 0x00)
            .with_taskfile_bars()
            .with_bar(
                5,
                SimBar::Mem32 {
                    size: mmio_size,
                    prefetchable: false,
                },
            )
            .with_controller(SimController::new(SimLayout::SiiSata, channels))
    }

    fn with_taskfile_bars(self) -> Self {
        self.with_bar(0, SimBar::Io { size: 8 })
            .with_bar(1, SimBar::Io { size: 4 })
            .with_bar(2, SimBar::Io { size: 8 })
            .with_bar(3, SimBar::Io { size: 4 })
            .with_bar(4, SimBar::Io { size: 16 })
    }

    pub fn with_controller(mut self, controller: SimController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn config(&self) -> &SimConfigSpace {
        &self.config
    }

    pub fn controller(&self) -> Option<&SimController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut SimController> {
        self.controller.as_mut()
    }

    /// Whether the fixed ports behind `region` reach this function: only IDE channels in
    /// compatibility mode decode them.
    fn decodes_legacy(&self, region: &Region) -> bool {
        let native_bit = match *region {
            Region::Command { channel: 0, .. } | Region::Control { channel: 0 } => 0x01,
            Region::Command { channel: 1, .. } | Region::Control { channel: 1 } => 0x04,
            _ => return false,
        };
        self.config.class() == 0x01
            && self.config.interface() & native_bit == 0
            && matches!(
                self.controller.as_ref().map(SimController::layout),
                Some(SimLayout::PciIde)
            )
    }
}

/// One configuration cycle the host ran, as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimConfigAccess {
    Read { tag: PciTag, reg: u8 },
    Write { tag: PciTag, reg: u8, val: u32 },
}

impl SimConfigAccess {
    pub fn tag(&self) -> PciTag {
        match *self {
            Self::Read { tag, .. } | Self::Write { tag, .. } => tag,
        }
    }

    pub fn reg(&self) -> u8 {
        match *self {
            Self::Read { reg, .. } | Self::Write { reg, .. } => reg,
        }
    }
}

/// Host-side model of the board: PCI configuration space, storage controllers behind their
/// windows, and a virtual clock.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    functions: BTreeMap<PciTag, SimFunction>,
    clock: SimClock,
    config_log: Vec<SimConfigAccess>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, tag: PciTag, function: SimFunction) -> Result<()> {
        if self.functions.contains_key(&tag) {
            return Err(SimError::SlotTaken { tag });
        }
        self.functions.insert(tag, function);
        Ok(())
    }

    pub fn function(&self, tag: PciTag) -> Option<&SimFunction> {
        self.functions.get(&tag)
    }

    pub fn function_mut(&mut self, tag: PciTag) -> Option<&mut SimFunction> {
        self.functions.get_mut(&tag)
    }

    pub fn channel(&self, tag: PciTag, index: usize) -> Option<&SimChannel> {
        self.function(tag)?.controller()?.channel(index)
    }

    pub fn channel_mut(&mut self, tag: PciTag, index: usize) -> Option<&mut SimChannel> {
        self.function_mut(tag)?.controller_mut()?.channel_mut(index)
    }

    pub fn clock(&self) -> SimClock {
        self.clock
    }

    /// Configuration cycles to present functions, oldest first.
    pub fn config_accesses(&self) -> &[SimConfigAccess] {
        &self.config_log
    }

    pub fn clear_config_accesses(&mut self) {
        self.config_log.clear();
    }

    /// A bus is reachable once some bridge forwards it.
    fn bus_visible(&self, bus: u8) -> bool {
        bus == 0
            || self.functions.values().any(|f| {
                let (secondary, subordinate) = (f.config.byte(0x19), f.config.byte(0x1A));
                f.config.is_bridge() && secondary != 0 && (secondary..=subordinate).contains(&bus)
            })
    }

    fn route(&mut self, addr: u32) -> Option<(&mut SimController, Region)> {
        let io_port = addr
            .checked_sub(PCI_IO_CPU_BASE)
            .filter(|&port| port < PCI_IO_CPU_SPAN);

        let mut hit = None;
        for (tag, function) in &self.functions {
            let command = function.config.command();
            if function.controller.is_none() {
                continue;
            }
            match io_port {
                Some(port) if command & COMMAND_IO != 0 => {
                    if let Some(region) = SimController::decode_legacy_port(port)
                        .filter(|region| function.decodes_legacy(region))
                    {
                        hit = Some((*tag, region));
                        break;
                    }
                    if let Some(region) = decode_windows(function, port, true) {
                        hit = Some((*tag, region));
                        break;
                    }
                }
                None if command & COMMAND_MEM != 0 => {
                    if let Some(region) = decode_windows(function, addr, false) {
                        hit = Some((*tag, region));
                        break;
                    }
                }
                _ => {}
            }
        }

        let (tag, region) = hit?;
        let controller = self.functions.get_mut(&tag)?.controller.as_mut()?;
        Some((controller, region))
    }

    fn bus_read(&mut self, addr: u32, width: u32) -> u32 {
        match self.route(addr) {
            Some((controller, region)) => controller.read(region, width),
            None => {
                trace!(addr = format_args!("{addr:#x}"), width, "master abort on read");
                match width {
                    1 => 0xFF,
                    2 => 0xFFFF,
                    _ => 0xFFFF_FFFF,
                }
            }
        }
    }

    fn bus_write(&mut self, addr: u32, width: u32, val: u32) {
        match self.route(addr) {
            Some((controller, region)) => controller.write(region, width, val),
            None => trace!(addr = format_args!("{addr:#x}"), width, val, "write dropped"),
        }
    }
}

fn decode_windows(function: &SimFunction, addr: u32, io: bool) -> Option<Region> {
    let controller = function.controller.as_ref()?;
    (0..6u8).find_map(|index| {
        let (bar, base) = function.config.bar(index)?;
        if bar.is_io() != io {
            return None;
        }
        let offset = addr.checked_sub(base).filter(|&off| off < bar.size())?;
        Some(controller.decode_bar(index, offset))
    })
}

impl PciConfigAccess for SimBoard {
    fn read_config(&mut self, tag: PciTag, reg: u8) -> u32 {
        if !self.bus_visible(tag.bus()) {
            return 0xFFFF_FFFF;
        }
        let Some(function) = self.functions.get(&tag) else {
            return 0xFFFF_FFFF;
        };
        let val = function.config.read(reg);
        self.config_log.push(SimConfigAccess::Read { tag, reg });
        val
    }

    fn write_config(&mut self, tag: PciTag, reg: u8, val: u32) {
        if !self.bus_visible(tag.bus()) {
            return;
        }
        if let Some(function) = self.functions.get_mut(&tag) {
            function.config.write(reg, val);
            self.config_log.push(SimConfigAccess::Write { tag, reg, val });
        }
    }
}

impl RegisterIo for SimBoard {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.bus_read(addr, 1) as u8
    }

    fn write_u8(&mut self, addr: u32, val: u8) {
        self.bus_write(addr, 1, u32::from(val))
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.bus_read(addr, 2) as u16
    }

    fn write_u16(&mut self, addr: u32, val: u16) {
        self.bus_write(addr, 2, u32::from(val))
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.bus_read(addr, 4)
    }

    fn write_u32(&mut self, addr: u32, val: u32) {
        self.bus_write(addr, 4, val)
    }
}

impl Delay for SimBoard {
    fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(u64::from(us));
    }
}
