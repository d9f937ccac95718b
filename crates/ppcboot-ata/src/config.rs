/// Wake attempts for a parallel ATA drive found in standby.
pub const PATA_WAKE_RETRIES: u32 = 10;
/// Wake attempts for a Serial ATA drive found in standby.
pub const SATA_WAKE_RETRIES: u32 = 20;
/// Soft reset attempts for a Serial ATA drive that is already spinning.
pub const SATA_RESET_RETRIES: u32 = 20;
/// Link reset sequences tried before a SATA port is declared empty.
pub const SATA_LINK_ATTEMPTS: u32 = 2;
/// Pause between wake attempts.
pub const WAKE_INTERVAL_MS: u32 = 1000;
pub const RESET_BUDGET_MS: u32 = 150;
pub const IDENTIFY_BUDGET_MS: u32 = 1000;
/// Per-sector wait during a committed transfer.
pub const SECTOR_BUDGET_MS: u32 = 1000;

/// Retry counts and wait budgets of channel bring-up and I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringUpConfig {
    pub pata_wake_retries: u32,
    pub sata_wake_retries: u32,
    pub sata_reset_retries: u32,
    pub sata_link_attempts: u32,
    pub wake_interval_ms: u32,
    pub reset_budget_ms: u32,
    pub identify_budget_ms: u32,
    pub sector_budget_ms: u32,
    /// Bit `n` set: parallel ATA channel `n` is skipped without probing.
    pub pata_disable_mask: u8,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            pata_wake_retries: PATA_WAKE_RETRIES,
            sata_wake_retries: SATA_WAKE_RETRIES,
            sata_reset_retries: SATA_RESET_RETRIES,
            sata_link_attempts: SATA_LINK_ATTEMPTS,
            wake_interval_ms: WAKE_INTERVAL_MS,
            reset_budget_ms: RESET_BUDGET_MS,
            identify_budget_ms: IDENTIFY_BUDGET_MS,
            sector_budget_ms: SECTOR_BUDGET_MS,
            pata_disable_mask: 0,
        }
    }
}

impl BringUpConfig {
    pub fn pata_disabled(&self, channel: usize) -> bool {
        channel < 8 && self.pata_disable_mask & (1 << channel) != 0
    }
}
