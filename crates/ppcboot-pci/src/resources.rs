use ppcboot_platform::constants::{
    PCI_IO_WINDOW_BASE, PCI_IO_WINDOW_END, PCI_MEM_WINDOW_BASE, PCI_MEM_WINDOW_END,
};
use ppcboot_platform::PciTag;

use crate::regs::{WindowKind, PCI_INTERRUPT_LINE_REG};

/// Smallest I/O window the allocator hands out.
pub const MIN_IO_ALIGN: u32 = 16;
/// Smallest memory window the allocator hands out.
pub const MIN_MEM_ALIGN: u32 = 0x1000;
/// Bridge I/O aperture granularity.
pub const BRIDGE_IO_ALIGN: u32 = 0x1000;
/// Bridge memory aperture granularity.
pub const BRIDGE_MEM_ALIGN: u32 = 0x10_0000;

#[derive(Debug, Clone)]
pub struct PciWindowsConfig {
    /// First PCI memory address handed out.
    pub mem_base: u32,
    /// End (exclusive) of the PCI memory range.
    pub mem_end: u32,
    /// First PCI I/O address handed out.
    pub io_base: u32,
    /// End (exclusive) of the PCI I/O range.
    pub io_end: u32,
    /// Cache line size programmed into every function, in dwords.
    pub cache_line_dwords: u8,
    pub latency_timer: u8,
    /// Configuration byte that receives the slot number of each function. The board routes
    /// interrupts by IDSEL and expects firmware to leave the slot here.
    pub slot_select_reg: u8,
}

impl Default for PciWindowsConfig {
    fn default() -> Self {
        Self {
            mem_base: PCI_MEM_WINDOW_BASE,
            mem_end: PCI_MEM_WINDOW_END,
            io_base: PCI_IO_WINDOW_BASE,
            io_end: PCI_IO_WINDOW_END,
            // 32-byte lines on the 603e/e300 cores.
            cache_line_dwords: 8,
            latency_timer: 0x20,
            slot_select_reg: PCI_INTERRUPT_LINE_REG,
        }
    }
}

/// One window the walker placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub tag: PciTag,
    pub bar: u8,
    pub kind: WindowKind,
    pub base: u32,
    pub size: u32,
}

impl Placement {
    pub fn end_exclusive(&self) -> u64 {
        u64::from(self.base) + u64::from(self.size)
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        self.kind == other.kind
            && u64::from(self.base) < other.end_exclusive()
            && u64::from(other.base) < self.end_exclusive()
    }
}

/// Bump allocator over the platform's PCI address ranges.
///
/// Cursors only move forward during an enumeration pass; nothing is ever given back. That is
/// sufficient because the bus is walked exactly once per boot.
#[derive(Debug, Clone)]
pub struct ResourceWindows {
    cfg: PciWindowsConfig,
    mem_start: u32,
    mem_limit: u32,
    io_start: u32,
    io_limit: u32,
    max_bus: u8,
}

impl ResourceWindows {
    pub fn new(cfg: PciWindowsConfig) -> Self {
        Self {
            mem_start: cfg.mem_base,
            mem_limit: cfg.mem_end,
            io_start: cfg.io_base,
            io_limit: cfg.io_end,
            max_bus: 0,
            cfg,
        }
    }

    pub fn config(&self) -> &PciWindowsConfig {
        &self.cfg
    }

    /// Rewinds every cursor to the platform bounds.
    pub fn reset(&mut self) {
        self.mem_start = self.cfg.mem_base;
        self.mem_limit = self.cfg.mem_end;
        self.io_start = self.cfg.io_base;
        self.io_limit = self.cfg.io_end;
        self.max_bus = 0;
    }

    pub fn mem_start(&self) -> u32 {
        self.mem_start
    }

    pub fn mem_limit(&self) -> u32 {
        self.mem_limit
    }

    pub fn io_start(&self) -> u32 {
        self.io_start
    }

    pub fn io_limit(&self) -> u32 {
        self.io_limit
    }

    /// Highest bus number handed out so far.
    pub fn max_bus(&self) -> u8 {
        self.max_bus
    }

    /// Hands out the next bus number, or `None` once 255 is used.
    pub fn next_bus(&mut self) -> Option<u8> {
        let next = self.max_bus.checked_add(1)?;
        self.max_bus = next;
        Some(next)
    }

    /// Places an I/O window of `size` bytes (a power of two).
    pub fn alloc_io(&mut self, size: u32) -> Option<u32> {
        let (base, next) = place(self.io_start, self.io_limit, size, MIN_IO_ALIGN)?;
        self.io_start = next;
        Some(base)
    }

    /// Places a memory window of `size` bytes (a power of two).
    pub fn alloc_mem(&mut self, size: u32) -> Option<u32> {
        let (base, next) = place(self.mem_start, self.mem_limit, size, MIN_MEM_ALIGN)?;
        self.mem_start = next;
        Some(base)
    }

    /// Rounds the I/O cursor up to `align` (clamped to the limit) and returns it.
    pub fn align_io(&mut self, align: u32) -> u32 {
        self.io_start = align_up_clamped(self.io_start, align, self.io_limit);
        self.io_start
    }

    /// Rounds the memory cursor up to `align` (clamped to the limit) and returns it.
    pub fn align_mem(&mut self, align: u32) -> u32 {
        self.mem_start = align_up_clamped(self.mem_start, align, self.mem_limit);
        self.mem_start
    }
}

fn place(cursor: u32, limit: u32, size: u32, min_align: u32) -> Option<(u32, u32)> {
    if size == 0 || !size.is_power_of_two() {
        return None;
    }
    let align = u64::from(size.max(min_align));
    let base = align_up_u64(u64::from(cursor), align);
    let end = base + u64::from(size);
    if end > u64::from(limit) {
        return None;
    }
    Some((base as u32, end as u32))
}

fn align_up_clamped(value: u32, align: u32, limit: u32) -> u32 {
    align_up_u64(u64::from(value), u64::from(align)).min(u64::from(limit)) as u32
}

fn align_up_u64(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}
