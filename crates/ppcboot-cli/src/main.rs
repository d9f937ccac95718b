#![forbid(unsafe_code)]

mod board;
mod report;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use ppcboot::disk::SECTOR_SIZE;
use ppcboot::{BootConfig, BootContext};
use tracing_subscriber::EnvFilter;

/// Largest block dump accepted on the command line.
const MAX_DUMP_BLOCKS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControllerKind {
    /// ITE 8211 native-mode PCI IDE, one drive per channel.
    Ide,
    /// VIA 82C571 in compatibility mode on the legacy ports.
    LegacyIde,
    /// SiI 3112 two-port SATA.
    Sii3112,
    /// SiI 3114 four-port SATA.
    Sii3114,
}

#[derive(Parser, Debug)]
#[command(
    name = "ppcboot-sim",
    about = "Boot raw disk images on a simulated board and report what the storage probe finds."
)]
pub struct Args {
    /// Raw disk images, one per channel in order
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Storage controller the images are attached to
    #[arg(long, value_enum, default_value_t = ControllerKind::Ide)]
    pub controller: ControllerKind,

    /// Put the controller behind a PCI-PCI bridge
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub behind_bridge: bool,

    /// Start every drive spun down; it needs this many wake pulses
    #[arg(long, value_name = "PULSES")]
    pub standby: Option<u32>,

    /// Skip parallel ATA channels whose bit is set
    #[arg(long, value_name = "MASK", default_value_t = 0)]
    pub pata_disable_mask: u8,

    /// Boot sector partition type holding the disklabel
    #[arg(long, value_name = "TYPE", default_value_t = 0xA9)]
    pub partition_type: u8,

    /// Open partition LETTER of every disk and report its filesystem
    #[arg(long, value_name = "LETTER")]
    pub open: Option<char>,

    /// Hex dump BLOCK of UNIT (`UNIT:BLOCK`)
    #[arg(long, value_name = "UNIT:BLOCK", value_parser = parse_dump)]
    pub dump: Option<(usize, u64)>,

    /// Number of blocks to dump
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub count: u32,
}

fn parse_dump(s: &str) -> Result<(usize, u64), String> {
    let (unit, block) = s
        .split_once(':')
        .ok_or_else(|| format!("expected UNIT:BLOCK, got {s:?}"))?;
    let unit = unit.parse().map_err(|e| format!("unit {unit:?}: {e}"))?;
    let block = block.parse().map_err(|e| format!("block {block:?}: {e}"))?;
    Ok((unit, block))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.count == 0 || args.count > MAX_DUMP_BLOCKS {
        bail!("--count must be between 1 and {MAX_DUMP_BLOCKS}");
    }

    let board = board::build(&args)?;
    let mut config = BootConfig::default();
    config.ata.pata_disable_mask = args.pata_disable_mask;
    config.label.partition_type = args.partition_type;

    let mut ctx = BootContext::new(board, config);
    let found = ctx.probe();
    let clock = ctx.board().clock();
    tracing::debug!(elapsed_ms = clock.now_ms(), "probe finished");

    let mut out = std::io::stdout().lock();
    report::disks(&mut out, &ctx)?;
    if found == 0 {
        bail!("no disks found");
    }

    if let Some(letter) = args.open {
        let partition = report::partition_index(letter)?;
        for unit in 0..found {
            report::open(&mut out, &mut ctx, unit, partition)?;
        }
    }

    if let Some((unit, block)) = args.dump {
        let mut buf = vec![0u8; args.count as usize * SECTOR_SIZE];
        ctx.read_blocks(unit, block, args.count, &mut buf)
            .with_context(|| format!("read {} blocks of unit {unit} at {block}", args.count))?;
        report::hexdump(&mut out, block * SECTOR_SIZE as u64, &buf)?;
    }
    Ok(())
}
