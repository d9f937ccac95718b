//! Programmed-I/O sector reads.

use ppcboot_platform::{Delay, RegisterIo};
use tracing::trace;

use crate::error::{AtaError, AtaOp, Result};
use crate::regs::*;
use crate::wait::await_ready;
use crate::window::ChannelRegisters;

/// Sectors moved per command. 255 keeps the count in one byte for both command forms.
pub const MAX_SECTORS_PER_COMMAND: u32 = 255;
/// First block that needs the 48-bit command form.
pub const LBA28_LIMIT: u64 = 1 << 28;
/// One past the highest 48-bit block.
pub const LBA48_LIMIT: u64 = 1 << 48;

/// One read command of a larger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadChunk {
    pub lba: u64,
    pub count: u32,
    /// READ SECTORS EXT rather than READ SECTORS.
    pub ext: bool,
}

/// Splits `count` sectors from `start` into commands of at most
/// [`MAX_SECTORS_PER_COMMAND`]. Each chunk picks its command form by its own start block.
pub fn plan_reads(start: u64, count: u32) -> impl Iterator<Item = ReadChunk> {
    let mut lba = start;
    let mut remaining = count;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let n = remaining.min(MAX_SECTORS_PER_COMMAND);
        let chunk = ReadChunk {
            lba,
            count: n,
            ext: lba >= LBA28_LIMIT,
        };
        lba += u64::from(n);
        remaining -= n;
        Some(chunk)
    })
}

fn issue<B: RegisterIo + ?Sized>(io: &mut B, regs: &ChannelRegisters, chunk: ReadChunk) {
    let lba = chunk.lba;
    let count = chunk.count as u8;
    if chunk.ext {
        // High-order bytes go in first; each register keeps the previous write as its HOB.
        regs.write_reg(io, ATA_REG_SECTOR_COUNT, 0);
        regs.write_reg(io, ATA_REG_LBA0, (lba >> 24) as u8);
        regs.write_reg(io, ATA_REG_LBA1, (lba >> 32) as u8);
        regs.write_reg(io, ATA_REG_LBA2, (lba >> 40) as u8);
        regs.write_reg(io, ATA_REG_SECTOR_COUNT, count);
        regs.write_reg(io, ATA_REG_LBA0, lba as u8);
        regs.write_reg(io, ATA_REG_LBA1, (lba >> 8) as u8);
        regs.write_reg(io, ATA_REG_LBA2, (lba >> 16) as u8);
        regs.write_reg(io, ATA_REG_DEVICE, ATA_DEV_LBA);
        regs.command(io, ATA_CMD_READ_SECTORS_EXT);
    } else {
        regs.write_reg(io, ATA_REG_SECTOR_COUNT, count);
        regs.write_reg(io, ATA_REG_LBA0, lba as u8);
        regs.write_reg(io, ATA_REG_LBA1, (lba >> 8) as u8);
        regs.write_reg(io, ATA_REG_LBA2, (lba >> 16) as u8);
        regs.write_reg(
            io,
            ATA_REG_DEVICE,
            ATA_DEV_MASTER | ATA_DEV_LBA | ((lba >> 24) as u8 & 0x0F),
        );
        regs.command(io, ATA_CMD_READ_SECTORS);
    }
}

/// Reads `count` sectors from `start` into `buf`.
///
/// Every sector waits up to `budget_ms` for data. The first stall aborts the whole request;
/// nothing is retried.
pub fn read_sectors<B: RegisterIo + Delay + ?Sized>(
    io: &mut B,
    regs: &ChannelRegisters,
    start: u64,
    count: u32,
    buf: &mut [u8],
    budget_ms: u32,
) -> Result<()> {
    let needed = count as usize * SECTOR_SIZE;
    if buf.len() < needed {
        return Err(AtaError::BufferTooSmall {
            len: buf.len(),
            sectors: count,
        });
    }
    if start
        .checked_add(u64::from(count))
        .map_or(true, |end| end > LBA48_LIMIT)
    {
        return Err(AtaError::Unsupported { block: start });
    }

    let mut sectors = buf[..needed].chunks_exact_mut(SECTOR_SIZE);
    for chunk in plan_reads(start, count) {
        trace!(lba = chunk.lba, count = chunk.count, ext = chunk.ext, "read");
        issue(io, regs, chunk);
        for block in chunk.lba..chunk.lba + u64::from(chunk.count) {
            let status = await_ready(io, regs, budget_ms)
                .map_err(|source| AtaError::Timeout { block, source })?;
            if !status.contains(AtaStatus::DRQ) {
                return Err(AtaError::NoData {
                    op: AtaOp::Read,
                    status: status.bits(),
                });
            }
            let Some(sector) = sectors.next() else {
                break;
            };
            for pair in sector.chunks_exact_mut(2) {
                pair.copy_from_slice(&regs.read_data(io).to_le_bytes());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chunk_crossing_the_28_bit_boundary_keeps_the_short_form() {
        let chunks: Vec<_> = plan_reads(LBA28_LIMIT - 10, 300).collect();
        assert_eq!(
            chunks,
            vec![
                ReadChunk {
                    lba: LBA28_LIMIT - 10,
                    count: 255,
                    ext: false
                },
                ReadChunk {
                    lba: LBA28_LIMIT + 245,
                    count: 45,
                    ext: true
                },
            ]
        );
    }

    #[test]
    fn empty_request_issues_nothing() {
        assert_eq!(plan_reads(7, 0).count(), 0);
    }

    proptest! {
        #[test]
        fn chunks_are_contiguous_and_sum_to_the_request(
            start in 0u64..(1 << 30),
            count in 1u32..5000,
        ) {
            let chunks: Vec<_> = plan_reads(start, count).collect();
            prop_assert_eq!(chunks.len() as u32, count.div_ceil(MAX_SECTORS_PER_COMMAND));
            prop_assert_eq!(chunks.iter().map(|c| c.count).sum::<u32>(), count);
            let mut next = start;
            for chunk in &chunks {
                prop_assert_eq!(chunk.lba, next);
                prop_assert!(chunk.count >= 1 && chunk.count <= MAX_SECTORS_PER_COMMAND);
                prop_assert_eq!(chunk.ext, chunk.lba >= LBA28_LIMIT);
                next += u64::from(chunk.count);
            }
        }
    }
}
