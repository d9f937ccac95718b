//! Board memory map shared by the bus walker, the channel drivers and the simulator.
//!
//! These follow the MPC824x "map B" host bridge layout used by the supported NAS boards, which
//! must agree exactly with what the board's host bridge decodes.

/// CPU physical address at which PCI I/O space (bus address 0) is visible.
pub const PCI_IO_CPU_BASE: u32 = 0xFE00_0000;

/// First PCI I/O bus address handed out to BARs. Everything below is left to legacy ISA
/// devices (IDE compatibility ports, the super-I/O).
pub const PCI_IO_WINDOW_BASE: u32 = 0x0000_1000;

/// End (exclusive) of the PCI I/O bus range handed out to BARs.
pub const PCI_IO_WINDOW_END: u32 = 0x0010_0000;

/// First PCI memory address handed out to BARs. PCI memory is identity mapped into the CPU
/// physical address space.
pub const PCI_MEM_WINDOW_BASE: u32 = 0x8000_0000;

/// End (exclusive) of the PCI memory range handed out to BARs.
pub const PCI_MEM_WINDOW_END: u32 = 0x9000_0000;

/// Host bridge indirect configuration address register.
pub const PCI_CONFIG_ADDR: u32 = 0xFEC0_0000;

/// Host bridge indirect configuration data register.
pub const PCI_CONFIG_DATA: u32 = 0xFEE0_0000;

/// Legacy (compatibility mode) IDE command block ports, primary then secondary.
pub const LEGACY_IDE_CMD_PORTS: [u16; 2] = [0x1F0, 0x170];

/// Legacy (compatibility mode) IDE control block ports (alternate status / device control).
pub const LEGACY_IDE_CTL_PORTS: [u16; 2] = [0x3F6, 0x376];

/// CPU address of a PCI I/O bus address.
pub const fn pci_io_to_cpu(port: u32) -> u32 {
    PCI_IO_CPU_BASE + port
}
