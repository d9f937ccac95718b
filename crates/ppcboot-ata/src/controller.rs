//! A matched storage function and its channels.

use ppcboot_pci::regs::{PCI_CACHE_LINE_REG, PCI_CLASS_MASS_STORAGE};
use ppcboot_pci::{find_class, FunctionInfo};
use ppcboot_platform::{Board, Delay, PciConfigAccess, PciTag, RegisterIo};
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelState};
use crate::chips::{ChipFamily, SiiChip};
use crate::config::BringUpConfig;
use crate::error::{AtaError, Result};
use crate::identify::{IdentifyData, IDENTIFY_WORDS};
use crate::pio::read_sectors;
use crate::regs::{ATA_COMMAND_BLOCK_LEN, SCR_BLOCK_LEN};
use crate::window::{ChannelRegisters, LegacyIdePorts, RegisterWindow, ResolvedBars, WindowCarver};

/// Controllers attached per discovery pass. Storage functions without a driver do not count.
pub const MAX_CONTROLLERS: usize = 4;
/// Channels one controller can carry.
pub const MAX_CHANNELS: usize = 4;

/// Bytes of bus master registers per channel.
const BMDMA_LEN: u32 = 8;

/// Per-port register offsets inside the SiI BAR5 window.
struct SiiPort {
    taskfile: u32,
    control: u32,
    bmdma: u32,
    fifo_cfg: u32,
    scr: u32,
}

const SII_PORTS: [SiiPort; 4] = [
    SiiPort { taskfile: 0x080, control: 0x08A, bmdma: 0x000, fifo_cfg: 0x040, scr: 0x100 },
    SiiPort { taskfile: 0x0C0, control: 0x0CA, bmdma: 0x008, fifo_cfg: 0x044, scr: 0x180 },
    SiiPort { taskfile: 0x280, control: 0x28A, bmdma: 0x200, fifo_cfg: 0x240, scr: 0x300 },
    SiiPort { taskfile: 0x2C0, control: 0x2CA, bmdma: 0x208, fifo_cfg: 0x244, scr: 0x380 },
];

#[derive(Debug)]
pub struct Controller {
    tag: PciTag,
    chip: ChipFamily,
    channels: Vec<Channel>,
    scratch: Box<[u16; IDENTIFY_WORDS]>,
}

impl Controller {
    /// Matches `info` against the chip table, resolves every channel's registers and then
    /// applies the chip fix-ups. Channels are left [`ChannelState::Unprobed`].
    ///
    /// `legacy` is the board's single claim on the compatibility ports. The first controller
    /// with a channel in compatibility mode consumes it; such channels of any later controller
    /// are dropped, and a controller left with no channel is skipped.
    pub fn attach<B: Board + ?Sized>(
        board: &mut B,
        tag: PciTag,
        info: &FunctionInfo,
        legacy: &mut Option<LegacyIdePorts>,
    ) -> Option<Self> {
        let chip = ChipFamily::lookup(info)?;

        let mut bars = ResolvedBars::read(board, tag, info.header_kind());
        let regs = match chip {
            ChipFamily::PciIde(_) => {
                let native = [0, 1].map(|channel| info.ide_channel_native(channel));
                let ports = if native.contains(&false) {
                    let ports = legacy.take();
                    if ports.is_none() {
                        warn!(%tag, chip = chip.name(), "compatibility ports already claimed");
                    }
                    ports
                } else {
                    None
                };
                ide_channels(native, ports, &mut bars)
            }
            ChipFamily::SiiSata(part) => sii_channels(board, tag, part, &mut bars)?,
        };

        let channels: Vec<Channel> = regs
            .into_iter()
            .take(MAX_CHANNELS.min(chip.channel_count()))
            .enumerate()
            .filter_map(|(index, regs)| regs.map(|regs| Channel::new(index, regs)))
            .collect();
        if channels.is_empty() {
            warn!(%tag, chip = chip.name(), "no usable channel windows");
            return None;
        }
        chip.apply_config_fixup(board, tag);
        info!(%tag, chip = chip.name(), channels = channels.len(), "storage controller");

        Some(Self {
            tag,
            chip,
            channels,
            scratch: Box::new([0; IDENTIFY_WORDS]),
        })
    }

    pub fn tag(&self) -> PciTag {
        self.tag
    }

    pub fn chip(&self) -> ChipFamily {
        self.chip
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.iter().find(|c| c.index() == index)
    }

    /// Whether channel `index` came up with a drive.
    pub fn is_present(&self, index: usize) -> bool {
        self.channel(index).is_some_and(Channel::is_active)
    }

    pub fn active_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .filter(|c| c.is_active())
            .map(Channel::index)
    }

    fn active_channel(&self, index: usize) -> Result<&Channel> {
        let channel = self
            .channel(index)
            .ok_or(AtaError::ChannelAbsent { channel: index })?;
        channel.require_active()?;
        Ok(channel)
    }

    /// Brings up every channel: presence check, spin-up, reset.
    pub fn bring_up<B: RegisterIo + Delay + ?Sized>(&mut self, io: &mut B, cfg: &BringUpConfig) {
        for channel in &mut self.channels {
            let present = if channel.is_sata() {
                (0..cfg.sata_link_attempts).any(|_| channel.sata_presence(io))
            } else {
                !cfg.pata_disabled(channel.index())
            };
            let state = channel.bring_up(io, cfg, present);
            match state {
                ChannelState::Active => {
                    info!(tag = %self.tag, chip = self.chip.name(), channel = channel.index(), "drive ready")
                }
                _ => debug!(tag = %self.tag, channel = channel.index(), ?state, "channel empty"),
            }
        }
    }

    /// IDENTIFY DEVICE on an active channel, through the controller's scratch buffer.
    pub fn identify<B: RegisterIo + Delay + ?Sized>(
        &mut self,
        io: &mut B,
        index: usize,
        budget_ms: u32,
    ) -> Result<IdentifyData> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.index() == index)
            .ok_or(AtaError::ChannelAbsent { channel: index })?;
        channel.require_active()?;
        channel.identify(io, &mut self.scratch, budget_ms)?;
        Ok(IdentifyData::new(*self.scratch))
    }

    pub fn set_pio_mode<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        index: usize,
        budget_ms: u32,
    ) -> Result<()> {
        self.active_channel(index)?.set_pio_mode(io, budget_ms)
    }

    pub fn read_sectors<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        index: usize,
        start: u64,
        count: u32,
        buf: &mut [u8],
        budget_ms: u32,
    ) -> Result<()> {
        let channel = self.active_channel(index)?;
        read_sectors(io, channel.registers(), start, count, buf, budget_ms)
    }
}

/// Finds every storage function on the bus, attaches the ones the chip table knows and
/// brings their channels up.
pub fn discover<B: Board + ?Sized>(board: &mut B, cfg: &BringUpConfig) -> Vec<Controller> {
    let mut legacy = Some(LegacyIdePorts::claim());
    let mut controllers = Vec::new();
    for tag in find_class(board, PCI_CLASS_MASS_STORAGE, usize::MAX) {
        if controllers.len() == MAX_CONTROLLERS {
            warn!(%tag, "controller limit reached, ignoring the rest of the bus");
            break;
        }
        let Some(info) = FunctionInfo::read(board, tag) else {
            continue;
        };
        let Some(mut controller) = Controller::attach(board, tag, &info, &mut legacy) else {
            debug!(%tag, "storage function without a driver");
            continue;
        };
        controller.bring_up(board, cfg);
        controllers.push(controller);
    }
    controllers
}

/// PCI IDE. A native channel has its command block in BAR0/BAR2 and its control block in
/// BAR1/BAR3 (register at offset 2); a compatibility channel sits on the fixed ports and is
/// dropped when `legacy` is `None`. Bus master registers for both channels are in BAR4.
fn ide_channels(
    native: [bool; 2],
    legacy: Option<LegacyIdePorts>,
    bars: &mut ResolvedBars,
) -> Vec<Option<ChannelRegisters>> {
    let mut dma = split_dma(bars);
    let mut fixed = match legacy {
        Some(ports) => ports.into_windows().map(Some),
        None => [None, None],
    };
    (0..2)
        .map(|channel| {
            let (command, control) = if native[channel] {
                let command = bars.take(channel * 2, ATA_COMMAND_BLOCK_LEN)?;
                let (_, control) = bars.take(channel * 2 + 1, 4)?.split_at(2);
                (command, control.split_at(1).0)
            } else {
                fixed[channel].take()?
            };
            Some(ChannelRegisters::new(command, control).with_dma(dma[channel].take()))
        })
        .collect()
}

fn split_dma(bars: &mut ResolvedBars) -> [Option<RegisterWindow>; 2] {
    match bars.take(4, 2 * BMDMA_LEN) {
        Some(window) => {
            let (first, second) = window.split_at(BMDMA_LEN);
            [Some(first), Some(second)]
        }
        None => [None, None],
    }
}

fn sii_channels<B: Board + ?Sized>(
    board: &mut B,
    tag: PciTag,
    part: SiiChip,
    bars: &mut ResolvedBars,
) -> Option<Vec<Option<ChannelRegisters>>> {
    let (ports, mmio_len) = match part {
        SiiChip::Sii3114 => (4, 0x400),
        SiiChip::Sii3112 | SiiChip::Sii3512 => (2, 0x200),
    };
    let Some(mmio) = bars.take(5, mmio_len) else {
        warn!(%tag, "SATA register window was not placed");
        return None;
    };
    let mut carver = mmio.into_carver();

    sii_fifo_fixup(board, tag, &mut carver, ports);

    let channels = match part {
        SiiChip::Sii3114 => SII_PORTS
            .iter()
            .map(|port| {
                let command = carver.carve(port.taskfile, ATA_COMMAND_BLOCK_LEN)?;
                let control = carver.carve(port.control, 1)?;
                Some(
                    ChannelRegisters::new(command, control)
                        .with_dma(carver.carve(port.bmdma, BMDMA_LEN))
                        .with_link(carver.carve(port.scr, SCR_BLOCK_LEN)),
                )
            })
            .collect(),
        // The two-port parts keep the task files in the I/O windows; only the link
        // registers come from BAR5.
        SiiChip::Sii3112 | SiiChip::Sii3512 => ide_channels([true; 2], None, bars)
            .into_iter()
            .zip(SII_PORTS.iter())
            .map(|(regs, port)| {
                regs.map(|regs| regs.with_link(carver.carve(port.scr, SCR_BLOCK_LEN)))
            })
            .collect(),
    };
    Some(channels)
}

/// Sets each port's FIFO thresholds from the cache line size, one more than the line size
/// in 8-byte units for both directions.
fn sii_fifo_fixup<B: Board + ?Sized>(
    board: &mut B,
    tag: PciTag,
    carver: &mut WindowCarver,
    ports: usize,
) {
    let cache_line = board.read_config_u8(tag, PCI_CACHE_LINE_REG);
    if cache_line == 0 {
        return;
    }
    let threshold = u16::from((cache_line >> 1) + 1);
    for port in SII_PORTS.iter().take(ports) {
        if let Some(fifo) = carver.carve(port.fifo_cfg, 2) {
            fifo.write_u16(board, 0, (threshold << 8) | threshold);
        }
    }
    debug!(%tag, threshold, "FIFO thresholds set");
}
