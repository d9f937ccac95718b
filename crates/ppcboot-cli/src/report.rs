use std::io::Write;

use anyhow::bail;
use ppcboot::disk::label::partition_letter;
use ppcboot::disk::DiskError;
use ppcboot::{BootContext, BootError};
use ppcboot_sim::SimBoard;

pub fn disks(out: &mut impl Write, ctx: &BootContext<SimBoard>) -> anyhow::Result<()> {
    for disk in ctx.disks() {
        writeln!(
            out,
            "{}: <{}> {} MB, {} sectors",
            disk.name(),
            disk.model(),
            disk.capacity_mb(),
            disk.sectors()
        )?;
        let Some(label) = disk.label() else {
            writeln!(out, "  no disklabel")?;
            continue;
        };
        for (i, part) in label.partitions.iter().enumerate() {
            if !part.is_used() {
                continue;
            }
            writeln!(
                out,
                "  {}{}: {} offset {} size {}",
                disk.name(),
                partition_letter(i),
                part.kind(),
                part.offset,
                part.size
            )?;
        }
    }
    Ok(())
}

pub fn partition_index(letter: char) -> anyhow::Result<u8> {
    match letter {
        'a'..='p' => Ok(letter as u8 - b'a'),
        _ => bail!("partition letter must be a..p, got {letter:?}"),
    }
}

/// Opens one partition; a missing partition or unknown filesystem is reported, not fatal.
pub fn open(
    out: &mut impl Write,
    ctx: &mut BootContext<SimBoard>,
    unit: usize,
    partition: u8,
) -> anyhow::Result<()> {
    let name = format!(
        "{}{}",
        ctx.disks()[unit].name(),
        partition_letter(usize::from(partition))
    );
    match ctx.open(unit, partition) {
        Ok(file) => {
            let format = ctx.fs_format(file)?;
            let part = ctx.file(file)?;
            match format {
                Some(format) => writeln!(out, "{name}: {format} at sector {}", part.offset)?,
                None => writeln!(out, "{name}: raw at sector {}", part.offset)?,
            }
            ctx.close(file)?;
        }
        Err(BootError::Disk(err @ (DiskError::FormatMismatch | DiskError::NoSuchPartition { .. }))) => {
            writeln!(out, "{name}: {err}")?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub fn hexdump(out: &mut impl Write, base: u64, bytes: &[u8]) -> anyhow::Result<()> {
    for (i, line) in bytes.chunks(16).enumerate() {
        write!(out, "{:08x} ", base + i as u64 * 16)?;
        for b in line {
            write!(out, " {b:02x}")?;
        }
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(out, "  |{ascii}|")?;
    }
    Ok(())
}
