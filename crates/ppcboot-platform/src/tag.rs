use core::fmt;

/// Bus/device/function handle for configuration-space access.
///
/// The packed form is the configuration-address layout used by the host bridge:
/// - bit 31: enable marker
/// - bits 16..=23: bus
/// - bits 11..=15: device
/// - bits 8..=10: function
///
/// so a platform can OR a register offset into [`PciTag::raw`] and write it straight to its
/// address register.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciTag(u32);

impl PciTag {
    pub const ENABLE: u32 = 0x8000_0000;

    /// Creates a tag.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `device >= 32` or `function >= 8`.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        debug_assert!(device < 32);
        debug_assert!(function < 8);
        Self(
            Self::ENABLE
                | ((bus as u32) << 16)
                | (((device & 0x1F) as u32) << 11)
                | (((function & 0x07) as u32) << 8),
        )
    }

    pub const fn bus(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn device(self) -> u8 {
        ((self.0 >> 11) & 0x1F) as u8
    }

    pub const fn function(self) -> u8 {
        ((self.0 >> 8) & 0x07) as u8
    }

    /// Splits the tag back into `(bus, device, function)`.
    pub const fn decompose(self) -> (u8, u8, u8) {
        (self.bus(), self.device(), self.function())
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Configuration address for dword register `reg` of this function.
    pub const fn config_address(self, reg: u8) -> u32 {
        self.0 | (reg & 0xFC) as u32
    }
}

impl fmt::Debug for PciTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PciTag({:02x}:{:02x}.{})",
            self.bus(),
            self.device(),
            self.function()
        )
    }
}

impl fmt::Display for PciTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bus(), self.device(), self.function())
    }
}
