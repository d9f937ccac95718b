//! Bounded status polling.

use ppcboot_platform::{Delay, RegisterIo};
use tracing::trace;

use crate::error::{AtaError, AtaOp, WaitError};
use crate::regs::*;
use crate::window::ChannelRegisters;

/// How long SRST is held asserted.
const SRST_HOLD_US: u32 = 10;

/// Polls until the drive is neither busy nor faulted and reports ready.
///
/// Four alternate-status reads come first (the 400 ns settle after a command), then the
/// status register is read once per millisecond, at most `budget_ms` times. The status
/// that satisfied the wait is returned.
pub fn await_ready<B: RegisterIo + Delay + ?Sized>(
    io: &mut B,
    regs: &ChannelRegisters,
    budget_ms: u32,
) -> Result<AtaStatus, WaitError> {
    for _ in 0..4 {
        regs.alt_status(io);
    }

    let mut last = AtaStatus::BSY;
    for attempt in 0..budget_ms {
        let status = regs.status(io);
        if status.is_floating() {
            return Err(WaitError::NoDevice);
        }
        if !status.contains(AtaStatus::BSY) {
            if status.contains(AtaStatus::ERR) {
                return Err(WaitError::DeviceError {
                    status: status.bits(),
                    error: regs.error(io),
                });
            }
            if status.contains(AtaStatus::DRDY) {
                trace!(attempt, status = status.bits(), "drive ready");
                return Ok(status);
            }
        }
        last = status;
        io.delay_ms(1);
    }

    if last.contains(AtaStatus::BSY) {
        Err(WaitError::StillBusy {
            status: last.bits(),
        })
    } else {
        Err(WaitError::NotReady {
            status: last.bits(),
        })
    }
}

/// Pulses SRST and waits for the drive to come back.
pub fn soft_reset<B: RegisterIo + Delay + ?Sized>(
    io: &mut B,
    regs: &ChannelRegisters,
    budget_ms: u32,
) -> Result<(), AtaError> {
    regs.write_device_control(io, ATA_CTRL_NIEN);
    io.delay_us(SRST_HOLD_US);
    regs.write_device_control(io, ATA_CTRL_SRST | ATA_CTRL_NIEN);
    io.delay_us(SRST_HOLD_US);
    regs.write_device_control(io, ATA_CTRL_NIEN);

    await_ready(io, regs, budget_ms)
        .map(|_| ())
        .map_err(|source| AtaError::Wait {
            op: AtaOp::SoftReset,
            source,
        })
}
