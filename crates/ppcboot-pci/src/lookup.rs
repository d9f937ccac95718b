//! Read-only searches used by drivers to find their functions after enumeration.
//!
//! Neither search consults the allocator; bus numbers are taken from what the walker left in
//! the bridges' configuration registers.

use ppcboot_platform::{PciConfigAccess, PciTag};

use crate::regs::{FunctionInfo, PPB_SECONDARY_BUS_REG, PPB_SUBORDINATE_BUS_REG};
use crate::walk::{for_each_function, PCI_MAX_DEVICES, PCI_MAX_FUNCTIONS};

/// Makes a tag. Counterpart of [`decompose_tag`].
pub fn make_tag(bus: u8, device: u8, function: u8) -> PciTag {
    PciTag::new(bus, device, function)
}

pub fn decompose_tag(tag: PciTag) -> (u8, u8, u8) {
    tag.decompose()
}

/// Finds the first function with the given vendor/device pair.
///
/// Buses are scanned in ascending order for as long as some bridge already seen claims them
/// through its subordinate number, which covers exactly the densely numbered buses the walker
/// produced.
pub fn find_device<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    vendor_id: u16,
    device_id: u16,
) -> Option<PciTag> {
    let mut last_bus = 0u8;
    let mut bus = 0u8;
    loop {
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
                let Some(info) = FunctionInfo::read(cfg, tag) else {
                    continue;
                };
                if info.vendor_id == vendor_id && info.device_id == device_id {
                    return Some(tag);
                }
                if info.is_pci_bridge() {
                    last_bus = last_bus.max(cfg.read_config_u8(tag, PPB_SUBORDINATE_BUS_REG));
                }
            }
        }
        if bus >= last_bus {
            return None;
        }
        bus += 1;
    }
}

/// Collects up to `max` functions of base class `class`, descending through bridges in bus
/// order.
pub fn find_class<C: PciConfigAccess + ?Sized>(cfg: &mut C, class: u8, max: usize) -> Vec<PciTag> {
    let mut found = Vec::new();
    if max > 0 {
        find_class_on_bus(cfg, 0, class, max, &mut found);
    }
    found
}

fn find_class_on_bus<C: PciConfigAccess + ?Sized>(
    cfg: &mut C,
    bus: u8,
    class: u8,
    max: usize,
    found: &mut Vec<PciTag>,
) {
    for_each_function(cfg, bus, |cfg, tag, info| {
        if found.len() >= max {
            return;
        }
        if info.class == class {
            found.push(tag);
        }
        if info.is_pci_bridge() {
            let secondary = cfg.read_config_u8(tag, PPB_SECONDARY_BUS_REG);
            // An unprogrammed (or looping) bridge would send us back up the tree.
            if secondary > bus {
                find_class_on_bus(cfg, secondary, class, max, found);
            }
        }
    });
}
