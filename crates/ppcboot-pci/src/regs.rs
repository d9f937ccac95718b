use bitflags::bitflags;
use ppcboot_platform::{PciConfigAccess, PciTag};

pub const PCI_ID_REG: u8 = 0x00;
pub const PCI_COMMAND_STATUS_REG: u8 = 0x04;
pub const PCI_CLASS_REG: u8 = 0x08;
pub const PCI_BHLC_REG: u8 = 0x0C;
pub const PCI_CACHE_LINE_REG: u8 = 0x0C;
pub const PCI_LATENCY_REG: u8 = 0x0D;
pub const PCI_HEADER_TYPE_REG: u8 = 0x0E;
pub const PCI_BAR0_REG: u8 = 0x10;
pub const PCI_INTERRUPT_LINE_REG: u8 = 0x3C;

// Type 1 (bridge) header.
pub const PPB_BUS_NUMBERS_REG: u8 = 0x18;
pub const PPB_PRIMARY_BUS_REG: u8 = 0x18;
pub const PPB_SECONDARY_BUS_REG: u8 = 0x19;
pub const PPB_SUBORDINATE_BUS_REG: u8 = 0x1A;
pub const PPB_IO_BASE_LIMIT_REG: u8 = 0x1C;
pub const PPB_MEM_BASE_LIMIT_REG: u8 = 0x20;
pub const PPB_PREF_BASE_LIMIT_REG: u8 = 0x24;
pub const PPB_IO_UPPER_REG: u8 = 0x30;

pub const PCI_HEADER_MULTIFUNCTION: u8 = 0x80;

pub const PCI_CLASS_MASS_STORAGE: u8 = 0x01;
pub const PCI_SUBCLASS_IDE: u8 = 0x01;
pub const PCI_SUBCLASS_RAID: u8 = 0x04;
pub const PCI_SUBCLASS_SATA: u8 = 0x06;
pub const PCI_SUBCLASS_STORAGE_OTHER: u8 = 0x80;

pub const PCI_CLASS_BRIDGE: u8 = 0x06;
pub const PCI_SUBCLASS_BRIDGE_PCI: u8 = 0x04;

/// Programming-interface bits of an IDE function: primary and secondary channel in native mode.
pub const PCIIDE_PRIMARY_NATIVE: u8 = 0x01;
pub const PCIIDE_SECONDARY_NATIVE: u8 = 0x04;
pub const PCIIDE_INTERFACE_NATIVE: u8 = PCIIDE_PRIMARY_NATIVE | PCIIDE_SECONDARY_NATIVE;

bitflags! {
    /// Command register bits the walker programs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PciCommand: u16 {
        const IO_ENABLE = 0x0001;
        const MEM_ENABLE = 0x0002;
        const MASTER_ENABLE = 0x0004;
        const SERR_ENABLE = 0x0100;
    }
}

/// Header layout selected by the low 7 bits of the header-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Device,
    PciBridge,
    CardBusBridge,
    Unknown(u8),
}

impl HeaderKind {
    pub fn from_header_type(header_type: u8) -> Self {
        match header_type & !PCI_HEADER_MULTIFUNCTION {
            0 => Self::Device,
            1 => Self::PciBridge,
            2 => Self::CardBusBridge,
            other => Self::Unknown(other),
        }
    }

    /// Number of base-address registers this header layout carries.
    pub fn bar_count(self) -> u8 {
        match self {
            Self::Device => 6,
            Self::PciBridge => 2,
            Self::CardBusBridge => 1,
            Self::Unknown(_) => 0,
        }
    }
}

/// `true` for the vendor/device dword of an empty slot.
pub fn id_is_absent(id: u32) -> bool {
    id == 0 || id == 0xFFFF_FFFF
}

/// Identification of one function, read fresh from configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionInfo {
    pub vendor_id: u16,
    pub device_id: u16,
    pub class: u8,
    pub subclass: u8,
    pub interface: u8,
    pub revision: u8,
    pub header_type: u8,
}

impl FunctionInfo {
    /// Reads the identification registers, or `None` when nothing answers at `tag`.
    pub fn read<C: PciConfigAccess + ?Sized>(cfg: &mut C, tag: PciTag) -> Option<Self> {
        let id = cfg.read_config(tag, PCI_ID_REG);
        if id_is_absent(id) {
            return None;
        }
        let class = cfg.read_config(tag, PCI_CLASS_REG);
        let header_type = cfg.read_config_u8(tag, PCI_HEADER_TYPE_REG);
        Some(Self {
            vendor_id: id as u16,
            device_id: (id >> 16) as u16,
            class: (class >> 24) as u8,
            subclass: (class >> 16) as u8,
            interface: (class >> 8) as u8,
            revision: class as u8,
            header_type,
        })
    }

    pub fn header_kind(&self) -> HeaderKind {
        HeaderKind::from_header_type(self.header_type)
    }

    pub fn is_multifunction(&self) -> bool {
        self.header_type & PCI_HEADER_MULTIFUNCTION != 0
    }

    pub fn is_pci_bridge(&self) -> bool {
        self.class == PCI_CLASS_BRIDGE && self.subclass == PCI_SUBCLASS_BRIDGE_PCI
    }

    pub fn is_mass_storage(&self) -> bool {
        self.class == PCI_CLASS_MASS_STORAGE
    }

    pub fn is_ide(&self) -> bool {
        self.class == PCI_CLASS_MASS_STORAGE && self.subclass == PCI_SUBCLASS_IDE
    }

    /// Whether IDE channel `channel` (0 primary, 1 secondary) runs in native mode and decodes
    /// its own windows.
    pub fn ide_channel_native(&self, channel: usize) -> bool {
        let bit = match channel {
            0 => PCIIDE_PRIMARY_NATIVE,
            1 => PCIIDE_SECONDARY_NATIVE,
            _ => return false,
        };
        self.is_ide() && self.interface & bit != 0
    }

    /// An IDE function with neither channel in native mode decodes only the fixed ISA ports
    /// and must not be given windows. Mixed-mode functions are sized like native ones.
    pub fn is_legacy_ide(&self) -> bool {
        self.is_ide() && self.interface & PCIIDE_INTERFACE_NATIVE == 0
    }
}

/// Address space a window decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Io,
    Mem,
}

/// What a base-address register reported after being written with all ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarProbe {
    Io { size: u32 },
    Mem32 { size: u32, prefetchable: bool },
    /// Low half of a 64-bit memory window; the next register is its upper dword.
    Mem64 { size: u32, prefetchable: bool },
    /// The register is hardwired to zero.
    Unimplemented,
    /// The size mask is not a contiguous run of ones, or the type field is reserved.
    Malformed,
}

impl BarProbe {
    pub fn size(&self) -> Option<u32> {
        match *self {
            Self::Io { size } | Self::Mem32 { size, .. } | Self::Mem64 { size, .. } => Some(size),
            Self::Unimplemented | Self::Malformed => None,
        }
    }
}

const BAR_IO_SPACE: u32 = 0x1;
const BAR_IO_FLAGS_MASK: u32 = 0x3;
const BAR_MEM_FLAGS_MASK: u32 = 0xF;
const BAR_MEM_PREFETCHABLE: u32 = 0x8;

/// Decodes the read-back value of a BAR sizing probe.
pub fn decode_bar_probe(readback: u32) -> BarProbe {
    if readback & BAR_IO_SPACE != 0 {
        let mut mask = readback & !BAR_IO_FLAGS_MASK;
        if mask == 0 {
            return BarProbe::Unimplemented;
        }
        // 16-bit I/O decoders hardwire the upper half to zero.
        if mask & 0xFFFF_0000 == 0 {
            mask |= 0xFFFF_0000;
        }
        return match contiguous_size(mask) {
            Some(size) => BarProbe::Io { size },
            None => BarProbe::Malformed,
        };
    }

    let mask = readback & !BAR_MEM_FLAGS_MASK;
    if mask == 0 {
        return BarProbe::Unimplemented;
    }
    let prefetchable = readback & BAR_MEM_PREFETCHABLE != 0;
    let Some(size) = contiguous_size(mask) else {
        return BarProbe::Malformed;
    };
    match (readback >> 1) & 0x3 {
        // Type 1 is the obsolete "below 1MiB" encoding; it is placed like any 32-bit window.
        0 | 1 => BarProbe::Mem32 { size, prefetchable },
        2 => BarProbe::Mem64 { size, prefetchable },
        _ => BarProbe::Malformed,
    }
}

fn contiguous_size(mask: u32) -> Option<u32> {
    let size = 1u32 << mask.trailing_zeros();
    if mask | (size - 1) != u32::MAX {
        return None;
    }
    Some(size)
}
