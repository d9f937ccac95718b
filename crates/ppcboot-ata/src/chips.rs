//! The closed set of storage chips the loader drives.

use ppcboot_pci::regs::{PCI_CLASS_MASS_STORAGE, PCI_SUBCLASS_IDE};
use ppcboot_pci::FunctionInfo;
use ppcboot_platform::{PciConfigAccess, PciTag};
use tracing::debug;

/// Parallel ATA chips with the two-channel PCI IDE programming model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdeChip {
    Via571,
    Sii0680,
    Ite8211,
    /// Any other function of class mass storage / IDE.
    Generic,
}

/// Silicon Image SATALink parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiiChip {
    Sii3112,
    Sii3512,
    Sii3114,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipFamily {
    PciIde(IdeChip),
    SiiSata(SiiChip),
}

struct ChipEntry {
    vendor_id: u16,
    device_id: u16,
    chip: ChipFamily,
}

const VENDOR_VIA: u16 = 0x1106;
const VENDOR_SII: u16 = 0x1095;
const VENDOR_ITE: u16 = 0x1283;

const CHIP_TABLE: &[ChipEntry] = &[
    ChipEntry {
        vendor_id: VENDOR_VIA,
        device_id: 0x0571,
        chip: ChipFamily::PciIde(IdeChip::Via571),
    },
    ChipEntry {
        vendor_id: VENDOR_SII,
        device_id: 0x0680,
        chip: ChipFamily::PciIde(IdeChip::Sii0680),
    },
    ChipEntry {
        vendor_id: VENDOR_ITE,
        device_id: 0x8211,
        chip: ChipFamily::PciIde(IdeChip::Ite8211),
    },
    ChipEntry {
        vendor_id: VENDOR_SII,
        device_id: 0x3112,
        chip: ChipFamily::SiiSata(SiiChip::Sii3112),
    },
    ChipEntry {
        vendor_id: VENDOR_SII,
        device_id: 0x3512,
        chip: ChipFamily::SiiSata(SiiChip::Sii3512),
    },
    ChipEntry {
        vendor_id: VENDOR_SII,
        device_id: 0x3114,
        chip: ChipFamily::SiiSata(SiiChip::Sii3114),
    },
];

/// VIA: per-channel enable bits.
const VIA_IDE_ENABLE_REG: u8 = 0x40;
/// SiI 0680: system configuration register, bit 4 selects the 133 MHz base clock.
const SII0680_SYSCFG_REG: u8 = 0x8A;
const SII0680_TIMING_REG: u8 = 0x80;
/// ITE 8211: firmware (RAID) versus pass-through mode.
const ITE_MODE_REG: u8 = 0x50;
const ITE_TIMING_REG: u8 = 0x40;
const ITE_CLOCK_REG: u8 = 0x42;

impl ChipFamily {
    /// Picks the table entry for a function; unknown IDE-class functions fall back to
    /// [`IdeChip::Generic`].
    pub fn lookup(info: &FunctionInfo) -> Option<Self> {
        CHIP_TABLE
            .iter()
            .find(|e| e.vendor_id == info.vendor_id && e.device_id == info.device_id)
            .map(|e| e.chip)
            .or_else(|| {
                (info.class == PCI_CLASS_MASS_STORAGE && info.subclass == PCI_SUBCLASS_IDE)
                    .then_some(ChipFamily::PciIde(IdeChip::Generic))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PciIde(IdeChip::Via571) => "viaide",
            Self::PciIde(IdeChip::Sii0680) => "sii0680",
            Self::PciIde(IdeChip::Ite8211) => "iteide",
            Self::PciIde(IdeChip::Generic) => "pciide",
            Self::SiiSata(SiiChip::Sii3112) => "sii3112",
            Self::SiiSata(SiiChip::Sii3512) => "sii3512",
            Self::SiiSata(SiiChip::Sii3114) => "sii3114",
        }
    }

    pub fn channel_count(&self) -> usize {
        match self {
            Self::SiiSata(SiiChip::Sii3114) => 4,
            _ => 2,
        }
    }

    /// Configuration-space fix-ups applied before the channels are touched.
    pub fn apply_config_fixup<C: PciConfigAccess + ?Sized>(&self, cfg: &mut C, tag: PciTag) {
        match self {
            Self::PciIde(IdeChip::Via571) => {
                let enable = cfg.read_config_u8(tag, VIA_IDE_ENABLE_REG);
                cfg.write_config_u8(tag, VIA_IDE_ENABLE_REG, enable | 0x03);
            }
            Self::PciIde(IdeChip::Sii0680) => {
                let syscfg = cfg.read_config_u8(tag, SII0680_SYSCFG_REG);
                cfg.write_config_u8(tag, SII0680_SYSCFG_REG, syscfg | 0x10);
                cfg.write_config(tag, SII0680_TIMING_REG, 0);
            }
            Self::PciIde(IdeChip::Ite8211) => {
                cfg.write_config_u8(tag, ITE_MODE_REG, 0x00);
                cfg.write_config_u16(tag, ITE_TIMING_REG, 0xA0F3);
                cfg.write_config_u8(tag, ITE_CLOCK_REG, 0x36);
            }
            Self::PciIde(IdeChip::Generic) | Self::SiiSata(_) => return,
        }
        debug!(%tag, chip = self.name(), "chip fix-up applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(vendor_id: u16, device_id: u16, class: u8, subclass: u8) -> FunctionInfo {
        FunctionInfo {
            vendor_id,
            device_id,
            class,
            subclass,
            interface: 0,
            revision: 0,
            header_type: 0,
        }
    }

    #[test]
    fn known_ids_win_over_class() {
        assert_eq!(
            ChipFamily::lookup(&info(0x1095, 0x3114, 0x01, 0x80)),
            Some(ChipFamily::SiiSata(SiiChip::Sii3114))
        );
        assert_eq!(
            ChipFamily::lookup(&info(0x1106, 0x0571, 0x01, 0x01)),
            Some(ChipFamily::PciIde(IdeChip::Via571))
        );
    }

    #[test]
    fn unknown_ide_is_generic_and_other_storage_is_ignored() {
        assert_eq!(
            ChipFamily::lookup(&info(0x8086, 0x7111, 0x01, 0x01)),
            Some(ChipFamily::PciIde(IdeChip::Generic))
        );
        assert_eq!(ChipFamily::lookup(&info(0x1000, 0x0030, 0x01, 0x00)), None);
        assert_eq!(ChipFamily::lookup(&info(0x1095, 0x3124, 0x01, 0x04)), None);
    }

    #[test]
    fn only_the_3114_has_four_ports() {
        assert_eq!(ChipFamily::SiiSata(SiiChip::Sii3114).channel_count(), 4);
        assert_eq!(ChipFamily::SiiSata(SiiChip::Sii3512).channel_count(), 2);
        assert_eq!(ChipFamily::PciIde(IdeChip::Generic).channel_count(), 2);
    }
}
