#![forbid(unsafe_code)]

//! Downward interfaces the boot core consumes from the board.
//!
//! The loader never touches hardware directly. Everything goes through three small traits:
//!
//! - [`RegisterIo`]: memory-mapped register access with PCI (little-endian) byte lanes
//! - [`PciConfigAccess`]: configuration-space dword access addressed by [`PciTag`]
//! - [`Delay`]: a microsecond busy-wait
//!
//! A real board implements them over its host bridge; the host-side simulator (`ppcboot-sim`)
//! implements them over an in-memory model.

mod tag;

pub mod constants;

pub use tag::PciTag;

/// Memory-mapped register access.
///
/// Addresses are CPU physical addresses. Multi-byte accessors use PCI byte order: the value
/// returned by [`RegisterIo::read_u16`] is what a little-endian device placed on the bus, so a
/// big-endian CPU implementation byte-reverses the load (`lhbrx`).
///
/// Reads take `&mut self` because device registers have read side effects (reading the ATA
/// status register clears a pending interrupt, reading the data register advances the FIFO).
pub trait RegisterIo {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, val: u8);

    fn read_u16(&mut self, addr: u32) -> u16;
    fn write_u16(&mut self, addr: u32, val: u16);

    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u32(&mut self, addr: u32, val: u32);
}

/// Configuration-space access.
///
/// `reg` is a byte offset into the 256-byte header. Dword accessors require `reg` to be 4-byte
/// aligned; the narrower helpers are read-modify-write on top of them, which is safe for every
/// register this loader touches narrowly (none of them have write-one-to-clear bits in the
/// neighbouring lanes).
pub trait PciConfigAccess {
    fn read_config(&mut self, tag: PciTag, reg: u8) -> u32;
    fn write_config(&mut self, tag: PciTag, reg: u8, val: u32);

    fn read_config_u8(&mut self, tag: PciTag, reg: u8) -> u8 {
        let shift = u32::from(reg & 3) * 8;
        (self.read_config(tag, reg & !3) >> shift) as u8
    }

    fn write_config_u8(&mut self, tag: PciTag, reg: u8, val: u8) {
        let aligned = reg & !3;
        let shift = u32::from(reg & 3) * 8;
        let old = self.read_config(tag, aligned);
        let new = (old & !(0xFF << shift)) | (u32::from(val) << shift);
        self.write_config(tag, aligned, new);
    }

    fn read_config_u16(&mut self, tag: PciTag, reg: u8) -> u16 {
        debug_assert_eq!(reg & 1, 0, "unaligned 16-bit config access");
        let shift = u32::from(reg & 2) * 8;
        (self.read_config(tag, reg & !3) >> shift) as u16
    }

    fn write_config_u16(&mut self, tag: PciTag, reg: u8, val: u16) {
        debug_assert_eq!(reg & 1, 0, "unaligned 16-bit config access");
        let aligned = reg & !3;
        let shift = u32::from(reg & 2) * 8;
        let old = self.read_config(tag, aligned);
        let new = (old & !(0xFFFF << shift)) | (u32::from(val) << shift);
        self.write_config(tag, aligned, new);
    }
}

/// Microsecond busy-wait.
pub trait Delay {
    fn delay_us(&mut self, us: u32);

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// Everything the storage stack needs from the board in one bound.
pub trait Board: RegisterIo + PciConfigAccess + Delay {}

impl<T: RegisterIo + PciConfigAccess + Delay> Board for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Dwords {
        regs: std::collections::BTreeMap<u8, u32>,
    }

    impl PciConfigAccess for Dwords {
        fn read_config(&mut self, _tag: PciTag, reg: u8) -> u32 {
            assert_eq!(reg & 3, 0);
            self.regs.get(&reg).copied().unwrap_or(0)
        }

        fn write_config(&mut self, _tag: PciTag, reg: u8, val: u32) {
            assert_eq!(reg & 3, 0);
            self.regs.insert(reg, val);
        }
    }

    #[test]
    fn narrow_config_writes_preserve_neighbouring_lanes() {
        let tag = PciTag::new(0, 1, 0);
        let mut cfg = Dwords::default();
        cfg.write_config(tag, 0x0C, 0x0080_0000);

        cfg.write_config_u8(tag, 0x0C, 0x08);
        cfg.write_config_u8(tag, 0x0D, 0x20);
        assert_eq!(cfg.read_config(tag, 0x0C), 0x0080_2008);
        assert_eq!(cfg.read_config_u8(tag, 0x0E), 0x80);

        cfg.write_config_u16(tag, 0x0E, 0x1234);
        assert_eq!(cfg.read_config(tag, 0x0C), 0x1234_2008);
        assert_eq!(cfg.read_config_u16(tag, 0x0C), 0x2008);
    }
}
