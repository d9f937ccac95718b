//! Register windows handed out exactly once.
//!
//! A [`RegisterWindow`] is not `Clone`. Windows come from a function's [`ResolvedBars`] (moved
//! out with [`ResolvedBars::take`]), from the single [`LegacyIdePorts`] claim, or by splitting
//! or carving a window already owned. Two live windows over the same registers therefore
//! cannot be built, which is what keeps channels from sharing a task file.

use ppcboot_pci::regs::PCI_BAR0_REG;
use ppcboot_pci::HeaderKind;
use ppcboot_platform::constants::{
    pci_io_to_cpu, LEGACY_IDE_CMD_PORTS, LEGACY_IDE_CTL_PORTS,
};
use ppcboot_platform::{PciConfigAccess, PciTag, RegisterIo};

use crate::regs::*;

#[derive(Debug, PartialEq, Eq)]
pub struct RegisterWindow {
    base: u32,
    len: u32,
}

impl RegisterWindow {
    pub(crate) fn new(base: u32, len: u32) -> Self {
        Self { base, len }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Splits into `[0, at)` and `[at, len)`.
    pub fn split_at(self, at: u32) -> (RegisterWindow, RegisterWindow) {
        let at = at.min(self.len);
        (
            Self::new(self.base, at),
            Self::new(self.base + at, self.len - at),
        )
    }

    pub fn into_carver(self) -> WindowCarver {
        WindowCarver {
            window: self,
            taken: Vec::new(),
        }
    }

    fn addr(&self, offset: u32) -> u32 {
        debug_assert!(offset < self.len, "offset {offset:#x} outside a {:#x}-byte window", self.len);
        self.base + offset
    }

    pub fn read_u8(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32) -> u8 {
        io.read_u8(self.addr(offset))
    }

    pub fn write_u8(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32, val: u8) {
        io.write_u8(self.addr(offset), val)
    }

    pub fn read_u16(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32) -> u16 {
        io.read_u16(self.addr(offset))
    }

    pub fn write_u16(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32, val: u16) {
        io.write_u16(self.addr(offset), val)
    }

    pub fn read_u32(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32) -> u32 {
        io.read_u32(self.addr(offset))
    }

    pub fn write_u32(&self, io: &mut (impl RegisterIo + ?Sized), offset: u32, val: u32) {
        io.write_u32(self.addr(offset), val)
    }
}

/// Hands out disjoint sub-windows of one window in any order.
#[derive(Debug)]
pub struct WindowCarver {
    window: RegisterWindow,
    taken: Vec<(u32, u32)>,
}

impl WindowCarver {
    /// `None` if the range falls outside the window or overlaps a range already carved.
    pub fn carve(&mut self, offset: u32, len: u32) -> Option<RegisterWindow> {
        let end = offset.checked_add(len)?;
        if len == 0 || end > self.window.len {
            return None;
        }
        if self.taken.iter().any(|&(o, e)| offset < e && o < end) {
            return None;
        }
        self.taken.push((offset, end));
        Some(RegisterWindow::new(self.window.base + offset, len))
    }
}

/// CPU-visible bases of a function's windows as the bus walker programmed them.
#[derive(Debug)]
pub struct ResolvedBars {
    bars: [Option<u32>; 6],
}

impl ResolvedBars {
    /// Reads every BAR of `tag`. I/O windows are translated into the CPU's view of PCI I/O
    /// space; unprogrammed windows resolve to nothing.
    pub fn read<C: PciConfigAccess + ?Sized>(cfg: &mut C, tag: PciTag, header: HeaderKind) -> Self {
        let mut bars = [None; 6];
        let count = header.bar_count();
        let mut index = 0u8;
        while index < count {
            let raw = cfg.read_config(tag, PCI_BAR0_REG + index * 4);
            let slot = &mut bars[usize::from(index)];
            if raw & 0x1 != 0 {
                let port = raw & !0x3;
                *slot = (port != 0).then(|| pci_io_to_cpu(port));
                index += 1;
            } else {
                let base = raw & !0xF;
                *slot = (base != 0).then_some(base);
                // 64-bit windows span two registers.
                index += if (raw >> 1) & 0x3 == 0x2 { 2 } else { 1 };
            }
        }
        Self { bars }
    }

    pub fn base(&self, index: usize) -> Option<u32> {
        self.bars.get(index).copied().flatten()
    }

    /// Moves BAR `index` out as a window of `len` bytes. A second take of the same index
    /// yields `None`.
    pub fn take(&mut self, index: usize, len: u32) -> Option<RegisterWindow> {
        let base = self.bars.get_mut(index)?.take()?;
        Some(RegisterWindow::new(base, len))
    }
}

/// The fixed compatibility-mode IDE ports. Only one controller on the board can own them.
#[derive(Debug)]
pub struct LegacyIdePorts {
    _private: (),
}

impl LegacyIdePorts {
    /// The claim for one discovery pass.
    pub(crate) fn claim() -> Self {
        Self { _private: () }
    }

    /// Command block and control register windows of the primary and secondary channel.
    pub fn into_windows(self) -> [(RegisterWindow, RegisterWindow); 2] {
        [0, 1].map(|channel| {
            (
                RegisterWindow::new(
                    pci_io_to_cpu(u32::from(LEGACY_IDE_CMD_PORTS[channel])),
                    ATA_COMMAND_BLOCK_LEN,
                ),
                RegisterWindow::new(pci_io_to_cpu(u32::from(LEGACY_IDE_CTL_PORTS[channel])), 1),
            )
        })
    }
}

/// Every register of one channel. Owned by its controller and never shared.
#[derive(Debug)]
pub struct ChannelRegisters {
    command: RegisterWindow,
    /// Alternate status on read, device control on write.
    control: RegisterWindow,
    dma: Option<RegisterWindow>,
    link: Option<RegisterWindow>,
}

impl ChannelRegisters {
    pub fn new(command: RegisterWindow, control: RegisterWindow) -> Self {
        Self {
            command,
            control,
            dma: None,
            link: None,
        }
    }

    pub fn with_dma(mut self, dma: Option<RegisterWindow>) -> Self {
        self.dma = dma;
        self
    }

    pub fn with_link(mut self, link: Option<RegisterWindow>) -> Self {
        self.link = link;
        self
    }

    pub fn command_base(&self) -> u32 {
        self.command.base()
    }

    pub fn control_addr(&self) -> u32 {
        self.control.base()
    }

    pub fn dma(&self) -> Option<&RegisterWindow> {
        self.dma.as_ref()
    }

    /// Whether the channel has Serial ATA status/control registers.
    pub fn is_sata(&self) -> bool {
        self.link.is_some()
    }

    pub fn read_reg(&self, io: &mut (impl RegisterIo + ?Sized), reg: u32) -> u8 {
        self.command.read_u8(io, reg)
    }

    pub fn write_reg(&self, io: &mut (impl RegisterIo + ?Sized), reg: u32, val: u8) {
        self.command.write_u8(io, reg, val)
    }

    pub fn read_data(&self, io: &mut (impl RegisterIo + ?Sized)) -> u16 {
        self.command.read_u16(io, ATA_REG_DATA)
    }

    pub fn status(&self, io: &mut (impl RegisterIo + ?Sized)) -> AtaStatus {
        AtaStatus::from_bits_retain(self.read_reg(io, ATA_REG_STATUS_COMMAND))
    }

    pub fn error(&self, io: &mut (impl RegisterIo + ?Sized)) -> u8 {
        self.read_reg(io, ATA_REG_ERROR_FEATURES)
    }

    /// Reads the status without the side effects of the command block status register.
    pub fn alt_status(&self, io: &mut (impl RegisterIo + ?Sized)) -> AtaStatus {
        AtaStatus::from_bits_retain(self.control.read_u8(io, 0))
    }

    pub fn write_device_control(&self, io: &mut (impl RegisterIo + ?Sized), val: u8) {
        self.control.write_u8(io, 0, val)
    }

    pub fn command(&self, io: &mut (impl RegisterIo + ?Sized), cmd: u8) {
        self.write_reg(io, ATA_REG_STATUS_COMMAND, cmd)
    }

    pub fn read_link(&self, io: &mut (impl RegisterIo + ?Sized), reg: u32) -> Option<u32> {
        self.link.as_ref().map(|link| link.read_u32(io, reg))
    }

    pub fn write_link(&self, io: &mut (impl RegisterIo + ?Sized), reg: u32, val: u32) {
        if let Some(link) = self.link.as_ref() {
            link.write_u32(io, reg, val);
        }
    }
}
