#![forbid(unsafe_code)]

//! PCI bus walker and window allocator.
//!
//! [`enumerate`] visits every function reachable from bus 0 (recursing through PCI-PCI
//! bridges), turns on decoding and bus mastering, and bump-allocates each window from the
//! cursors held in [`ResourceWindows`]. Drivers find their functions afterwards with
//! [`find_device`] and [`find_class`], which only read configuration space.

mod host_bridge;
mod lookup;
pub mod regs;
mod resources;
mod walk;

pub use host_bridge::HostBridge;
pub use lookup::{decompose_tag, find_class, find_device, make_tag};
pub use ppcboot_platform::PciTag;
pub use regs::{decode_bar_probe, BarProbe, FunctionInfo, HeaderKind, PciCommand, WindowKind};
pub use resources::{
    PciWindowsConfig, Placement, ResourceWindows, BRIDGE_IO_ALIGN, BRIDGE_MEM_ALIGN,
    MIN_IO_ALIGN, MIN_MEM_ALIGN,
};
pub use walk::{enumerate, size_and_place, PCI_MAX_DEVICES, PCI_MAX_FUNCTIONS};
