use ppcboot_platform::constants::{PCI_CONFIG_ADDR, PCI_CONFIG_DATA};
use ppcboot_platform::{Delay, PciConfigAccess, PciTag, RegisterIo};

/// A board assembled from raw register access and a delay source, with configuration space
/// reached through the host bridge's indirect address/data register pair.
///
/// Every configuration access writes the enabled tag plus register offset to the address
/// register and then moves one dword through the data register. Both registers are
/// little-endian, like the rest of PCI space.
#[derive(Debug)]
pub struct HostBridge<R, D> {
    io: R,
    delay: D,
    addr_reg: u32,
    data_reg: u32,
}

impl<R: RegisterIo, D: Delay> HostBridge<R, D> {
    pub fn new(io: R, delay: D) -> Self {
        Self::with_registers(io, delay, PCI_CONFIG_ADDR, PCI_CONFIG_DATA)
    }

    pub fn with_registers(io: R, delay: D, addr_reg: u32, data_reg: u32) -> Self {
        Self {
            io,
            delay,
            addr_reg,
            data_reg,
        }
    }

    pub fn into_parts(self) -> (R, D) {
        (self.io, self.delay)
    }
}

impl<R: RegisterIo, D> PciConfigAccess for HostBridge<R, D> {
    fn read_config(&mut self, tag: PciTag, reg: u8) -> u32 {
        self.io.write_u32(self.addr_reg, tag.config_address(reg));
        self.io.read_u32(self.data_reg)
    }

    fn write_config(&mut self, tag: PciTag, reg: u8, val: u32) {
        self.io.write_u32(self.addr_reg, tag.config_address(reg));
        self.io.write_u32(self.data_reg, val);
    }
}

impl<R: RegisterIo, D> RegisterIo for HostBridge<R, D> {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.io.read_u8(addr)
    }

    fn write_u8(&mut self, addr: u32, val: u8) {
        self.io.write_u8(addr, val)
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.io.read_u16(addr)
    }

    fn write_u16(&mut self, addr: u32, val: u16) {
        self.io.write_u16(addr, val)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.io.read_u32(addr)
    }

    fn write_u32(&mut self, addr: u32, val: u32) {
        self.io.write_u32(addr, val)
    }
}

impl<R, D: Delay> Delay for HostBridge<R, D> {
    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us)
    }
}
