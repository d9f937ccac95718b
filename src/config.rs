use ppcboot_ata::BringUpConfig;
use ppcboot_disk::LabelConfig;
use ppcboot_pci::PciWindowsConfig;

/// Everything the boot path can be tuned with. Defaults are the board's values.
#[derive(Debug, Clone, Default)]
pub struct BootConfig {
    pub pci: PciWindowsConfig,
    pub ata: BringUpConfig,
    pub label: LabelConfig,
}
