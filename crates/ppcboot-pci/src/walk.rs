//! Bus enumeration and window assignment.

use ppcboot_platform::{PciConfigAccess, PciTag};
use tracing::{debug, warn};

use crate::regs::*;
use crate::resources::{Placement, ResourceWindows, BRIDGE_IO_ALIGN, BRIDGE_MEM_ALIGN};

pub const PCI_MAX_DEVICES: u8 = 32;
pub const PCI_MAX_FUNCTIONS: u8 = 8;

/// Walks every bus reachable from bus 0, programs every function found and places its windows.
///
/// The cursors in `windows` are rewound first, so this is the single enumeration pass of a
/// boot. Windows that do not fit are left at their power-up value and are not reported as
/// errors; the returned list holds only what was actually placed.
pub fn enumerate<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    windows: &mut ResourceWindows,
) -> Vec<Placement> {
    windows.reset();
    let mut placed = Vec::new();
    walk_bus(cfg, windows, 0, &mut placed);
    debug!(
        buses = u32::from(windows.max_bus()) + 1,
        windows = placed.len(),
        "PCI enumeration done"
    );
    placed
}

/// Calls `visit` for every present function on `bus`, honouring the multi-function bit of
/// function 0.
pub(crate) fn for_each_function<C, F>(cfg: &mut C, bus: u8, mut visit: F)
where
    C: PciConfigAccess + ?Sized,
    F: FnMut(&mut C, PciTag, FunctionInfo),
{
    for device in 0..PCI_MAX_DEVICES {
        let Some(info0) = FunctionInfo::read(cfg, PciTag::new(bus, device, 0)) else {
            continue;
        };
        let nfunc = if info0.is_multifunction() {
            PCI_MAX_FUNCTIONS
        } else {
            1
        };
        for function in 0..nfunc {
            let tag = PciTag::new(bus, device, function);
            let info = if function == 0 {
                info0
            } else {
                match FunctionInfo::read(cfg, tag) {
                    Some(info) => info,
                    None => continue,
                }
            };
            visit(cfg, tag, info);
        }
    }
}

fn walk_bus<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    windows: &mut ResourceWindows,
    bus: u8,
    placed: &mut Vec<Placement>,
) {
    for_each_function(cfg, bus, |cfg, tag, info| {
        init_function(cfg, windows, tag, &info, placed);
    });
}

fn init_function<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    windows: &mut ResourceWindows,
    tag: PciTag,
    info: &FunctionInfo,
    placed: &mut Vec<Placement>,
) {
    debug!(
        %tag,
        vendor = format_args!("{:04x}", info.vendor_id),
        device = format_args!("{:04x}", info.device_id),
        class = format_args!("{:02x}{:02x}{:02x}", info.class, info.subclass, info.interface),
        "PCI function"
    );

    let command = PciCommand::from_bits_retain(cfg.read_config_u16(tag, PCI_COMMAND_STATUS_REG))
        | PciCommand::IO_ENABLE
        | PciCommand::MEM_ENABLE
        | PciCommand::MASTER_ENABLE
        | PciCommand::SERR_ENABLE;
    cfg.write_config_u16(tag, PCI_COMMAND_STATUS_REG, command.bits());

    let wcfg = windows.config();
    let (cache_line, latency, slot_reg) =
        (wcfg.cache_line_dwords, wcfg.latency_timer, wcfg.slot_select_reg);
    cfg.write_config_u8(tag, PCI_CACHE_LINE_REG, cache_line);
    cfg.write_config_u8(tag, PCI_LATENCY_REG, latency);
    cfg.write_config_u8(tag, slot_reg, tag.device());

    if info.is_legacy_ide() {
        debug!(%tag, "IDE in compatibility mode, using fixed ports");
    } else {
        size_and_place(cfg, windows, tag, info.header_kind(), placed);
    }

    if info.is_pci_bridge() {
        setup_bridge(cfg, windows, tag, placed);
    }
}

/// Sizes every window register of `tag` and bump-allocates the ones that can be placed.
pub fn size_and_place<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    windows: &mut ResourceWindows,
    tag: PciTag,
    header: HeaderKind,
    placed: &mut Vec<Placement>,
) {
    let count = header.bar_count();
    let mut index = 0u8;
    while index < count {
        let reg = PCI_BAR0_REG + index * 4;
        let original = cfg.read_config(tag, reg);
        cfg.write_config(tag, reg, 0xFFFF_FFFF);
        let probe = decode_bar_probe(cfg.read_config(tag, reg));

        let (kind, size, consumed) = match probe {
            BarProbe::Unimplemented | BarProbe::Malformed => {
                cfg.write_config(tag, reg, original);
                index += 1;
                continue;
            }
            BarProbe::Mem64 {
                prefetchable: true, ..
            } => {
                debug!(%tag, bar = index, "skipping prefetchable 64-bit window");
                cfg.write_config(tag, reg, original);
                index += 2;
                continue;
            }
            BarProbe::Io { size } => (WindowKind::Io, size, 1),
            BarProbe::Mem32 { size, .. } => (WindowKind::Mem, size, 1),
            BarProbe::Mem64 { size, .. } => {
                if index + 1 >= count {
                    cfg.write_config(tag, reg, original);
                    break;
                }
                (WindowKind::Mem, size, 2)
            }
        };

        let base = match kind {
            WindowKind::Io => windows.alloc_io(size),
            WindowKind::Mem => windows.alloc_mem(size),
        };
        match base {
            Some(base) => {
                cfg.write_config(tag, reg, base);
                if consumed == 2 {
                    cfg.write_config(tag, reg + 4, 0);
                }
                debug!(
                    %tag,
                    bar = index,
                    ?kind,
                    base = format_args!("{base:#x}"),
                    size = format_args!("{size:#x}"),
                    "window placed"
                );
                placed.push(Placement {
                    tag,
                    bar: index,
                    kind,
                    base,
                    size,
                });
            }
            None => {
                debug!(%tag, bar = index, ?kind, size = format_args!("{size:#x}"), "no room for window");
                cfg.write_config(tag, reg, original);
            }
        }
        index += consumed;
    }
}

fn setup_bridge<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    windows: &mut ResourceWindows,
    tag: PciTag,
    placed: &mut Vec<Placement>,
) {
    let bus = tag.bus();
    let Some(secondary) = windows.next_bus() else {
        warn!(%tag, "out of bus numbers, bridge left unconfigured");
        return;
    };

    // Subordinate stays wide open while the subtree is walked.
    let numbers = cfg.read_config(tag, PPB_BUS_NUMBERS_REG);
    cfg.write_config(
        tag,
        PPB_BUS_NUMBERS_REG,
        (numbers & 0xFF00_0000) | (0xFF << 16) | (u32::from(secondary) << 8) | u32::from(bus),
    );

    let io_base = windows.align_io(BRIDGE_IO_ALIGN);
    let mem_base = windows.align_mem(BRIDGE_MEM_ALIGN);
    write_io_aperture(cfg, tag, io_base, None);
    write_mem_aperture(cfg, tag, mem_base, None);
    // No prefetchable aperture: base above limit.
    cfg.write_config(tag, PPB_PREF_BASE_LIMIT_REG, 0x0000_FFF0);

    walk_bus(cfg, windows, secondary, placed);

    let io_end = windows.align_io(BRIDGE_IO_ALIGN);
    let mem_end = windows.align_mem(BRIDGE_MEM_ALIGN);
    write_io_aperture(cfg, tag, io_base, (io_end > io_base).then(|| io_end - 1));
    write_mem_aperture(cfg, tag, mem_base, (mem_end > mem_base).then(|| mem_end - 1));

    // Only now is the depth of the subtree known.
    cfg.write_config_u8(tag, PPB_SUBORDINATE_BUS_REG, windows.max_bus());
    debug!(
        %tag,
        secondary,
        subordinate = windows.max_bus(),
        "bridge configured"
    );
}

/// `limit` of `None` programs a closed aperture (base above limit).
fn write_io_aperture<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    tag: PciTag,
    base: u32,
    limit: Option<u32>,
) {
    let (base, limit) = match limit {
        Some(limit) => (base, limit),
        None => (0xF000, 0),
    };
    // The low nibbles are the read-only addressing-capability field.
    let lo = (((limit >> 8) & 0xF0) << 8) | ((base >> 8) & 0xF0);
    cfg.write_config_u16(tag, PPB_IO_BASE_LIMIT_REG, lo as u16);
    cfg.write_config(tag, PPB_IO_UPPER_REG, (limit & 0xFFFF_0000) | (base >> 16));
}

fn write_mem_aperture<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    tag: PciTag,
    base: u32,
    limit: Option<u32>,
) {
    let (base, limit) = match limit {
        Some(limit) => (base, limit),
        None => (0xFFF0_0000, 0),
    };
    cfg.write_config(
        tag,
        PPB_MEM_BASE_LIMIT_REG,
        (limit & 0xFFF0_0000) | ((base >> 16) & 0xFFF0),
    );
}
