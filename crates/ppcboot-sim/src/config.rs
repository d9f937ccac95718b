//! Configuration space of one simulated function.

const CONFIG_SPACE_SIZE: usize = 256;
const BAR0: usize = 0x10;
const HEADER_TYPE: usize = 0x0E;

/// Window a function decodes once its BAR is programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBar {
    Io { size: u32 },
    Mem32 { size: u32, prefetchable: bool },
    /// 64-bit memory window; the following BAR slot is its high dword.
    Mem64 { size: u32, prefetchable: bool },
}

impl SimBar {
    pub fn size(&self) -> u32 {
        match *self {
            Self::Io { size } | Self::Mem32 { size, .. } | Self::Mem64 { size, .. } => size,
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    fn type_bits(&self) -> u32 {
        match *self {
            Self::Io { .. } => 0x1,
            Self::Mem32 { prefetchable, .. } => u32::from(prefetchable) << 3,
            Self::Mem64 { prefetchable, .. } => (0b10 << 1) | (u32::from(prefetchable) << 3),
        }
    }

    fn address_mask(&self) -> u32 {
        let low = if self.is_io() { 0x3 } else { 0xF };
        !(self.size() - 1) & !low
    }
}

#[derive(Debug, Clone, Default)]
struct BarState {
    def: Option<SimBar>,
    base: u32,
    probe: bool,
}

/// 256-byte header with BAR sizing semantics: writing all-ones to an implemented BAR makes the
/// next read return its size mask; unimplemented BARs read as zero.
#[derive(Debug, Clone)]
pub struct SimConfigSpace {
    bytes: [u8; CONFIG_SPACE_SIZE],
    bars: [BarState; 6],
}

impl SimConfigSpace {
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        let mut bytes = [0u8; CONFIG_SPACE_SIZE];
        bytes[0x00..0x02].copy_from_slice(&vendor_id.to_le_bytes());
        bytes[0x02..0x04].copy_from_slice(&device_id.to_le_bytes());
        Self {
            bytes,
            bars: Default::default(),
        }
    }

    pub fn vendor_id(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn device_id(&self) -> u16 {
        u16::from_le_bytes([self.bytes[2], self.bytes[3]])
    }

    pub fn set_class(&mut self, class: u8, subclass: u8, interface: u8, revision: u8) {
        self.bytes[0x08] = revision;
        self.bytes[0x09] = interface;
        self.bytes[0x0A] = subclass;
        self.bytes[0x0B] = class;
    }

    pub fn class(&self) -> u8 {
        self.bytes[0x0B]
    }

    pub fn interface(&self) -> u8 {
        self.bytes[0x09]
    }

    pub fn header_type(&self) -> u8 {
        self.bytes[HEADER_TYPE]
    }

    /// Header type is read-only to the loader; the board model sets it here.
    pub fn set_header_type(&mut self, header_type: u8) {
        self.bytes[HEADER_TYPE] = header_type;
    }

    pub fn command(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0x04], self.bytes[0x05]])
    }

    pub fn byte(&self, offset: u8) -> u8 {
        match usize::from(offset) {
            off @ BAR0..=0x27 if self.is_bar_slot((off - BAR0) / 4) => {
                let shift = (off & 3) * 8;
                (self.read_bar((off - BAR0) / 4) >> shift) as u8
            }
            off => self.bytes[off],
        }
    }

    pub fn is_bridge(&self) -> bool {
        self.header_type() & 0x7F == 0x01
    }

    fn bar_slots(&self) -> usize {
        match self.header_type() & 0x7F {
            0x00 => 6,
            0x01 => 2,
            _ => 0,
        }
    }

    fn is_bar_slot(&self, index: usize) -> bool {
        index < self.bar_slots()
    }

    pub fn set_bar(&mut self, index: u8, def: SimBar) {
        let index = usize::from(index);
        assert!(index < self.bars.len());
        assert!(def.size().is_power_of_two());
        if matches!(def, SimBar::Mem64 { .. }) {
            assert!(index + 1 < self.bars.len(), "64-bit BAR must not be the last slot");
            self.bars[index + 1] = BarState::default();
        }
        self.bars[index] = BarState {
            def: Some(def),
            base: 0,
            probe: false,
        };
    }

    /// Assigned window of BAR `index`, if it is implemented and programmed with a non-zero base.
    pub fn bar(&self, index: u8) -> Option<(SimBar, u32)> {
        let bar = self.bars.get(usize::from(index))?;
        let def = bar.def?;
        (bar.base != 0).then_some((def, bar.base))
    }

    pub fn read(&self, reg: u8) -> u32 {
        let off = usize::from(reg & !3);
        if (BAR0..=0x27).contains(&off) && self.is_bar_slot((off - BAR0) / 4) {
            return self.read_bar((off - BAR0) / 4);
        }
        u32::from_le_bytes([
            self.bytes[off],
            self.bytes[off + 1],
            self.bytes[off + 2],
            self.bytes[off + 3],
        ])
    }

    pub fn write(&mut self, reg: u8, value: u32) {
        let off = usize::from(reg & !3);
        if (BAR0..=0x27).contains(&off) && self.is_bar_slot((off - BAR0) / 4) {
            self.write_bar((off - BAR0) / 4, value);
            return;
        }
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            if !is_read_only(off + i) {
                self.bytes[off + i] = byte;
            }
        }
    }

    fn read_bar(&self, index: usize) -> u32 {
        let bar = &self.bars[index];
        match bar.def {
            Some(def) if bar.probe => def.address_mask() | def.type_bits(),
            Some(def) => bar.base | def.type_bits(),
            None if self.is_high_dword(index) => {
                let off = BAR0 + index * 4;
                u32::from_le_bytes([
                    self.bytes[off],
                    self.bytes[off + 1],
                    self.bytes[off + 2],
                    self.bytes[off + 3],
                ])
            }
            None => 0,
        }
    }

    fn write_bar(&mut self, index: usize, value: u32) {
        if self.is_high_dword(index) {
            let off = BAR0 + index * 4;
            self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
            return;
        }
        let bar = &mut self.bars[index];
        let Some(def) = bar.def else {
            return;
        };
        if value == 0xFFFF_FFFF {
            bar.probe = true;
        } else {
            bar.probe = false;
            bar.base = value & def.address_mask();
        }
    }

    fn is_high_dword(&self, index: usize) -> bool {
        index > 0
            && self.bars[index].def.is_none()
            && matches!(self.bars[index - 1].def, Some(SimBar::Mem64 { .. }))
    }
}

fn is_read_only(offset: usize) -> bool {
    // ID, status, revision/class and header type.
    offset < 0x04 || (0x06..0x0C).contains(&offset) || offset == HEADER_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_probe_reports_size_mask_then_takes_a_base() {
        let mut cfg = SimConfigSpace::new(0x1095, 0x3114);
        cfg.set_bar(0, SimBar::Io { size: 8 });
        cfg.set_bar(5, SimBar::Mem32 { size: 0x400, prefetchable: false });

        cfg.write(0x10, 0xFFFF_FFFF);
        assert_eq!(cfg.read(0x10), 0xFFFF_FFF9);
        cfg.write(0x10, 0x1008);
        assert_eq!(cfg.read(0x10), 0x1009);
        assert_eq!(cfg.bar(0), Some((SimBar::Io { size: 8 }, 0x1008)));

        cfg.write(0x24, 0xFFFF_FFFF);
        assert_eq!(cfg.read(0x24), 0xFFFF_FC00);
        cfg.write(0x14, 0xFFFF_FFFF);
        assert_eq!(cfg.read(0x14), 0);
    }

    #[test]
    fn identity_and_class_are_read_only() {
        let mut cfg = SimConfigSpace::new(0x1106, 0x0571);
        cfg.set_class(0x01, 0x01, 0x8A, 0x06);
        cfg.write(0x00, 0);
        cfg.write(0x08, 0);
        cfg.write(0x04, 0xFFFF_0007);
        assert_eq!(cfg.read(0x00), 0x0571_1106);
        assert_eq!(cfg.read(0x08), 0x0101_8A06);
        assert_eq!(cfg.read(0x04), 0x0000_0007);
    }

    #[test]
    fn bridge_exposes_two_bars_and_writable_bus_numbers() {
        let mut cfg = SimConfigSpace::new(0x3388, 0x0021);
        cfg.set_header_type(0x01);
        cfg.write(0x18, 0x00FF_0100);
        assert_eq!(cfg.byte(0x19), 1);
        assert_eq!(cfg.byte(0x1A), 0xFF);
    }
}
