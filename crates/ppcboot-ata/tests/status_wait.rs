use ppcboot_ata::regs::ATA_REG_STATUS_COMMAND;
use ppcboot_ata::{await_ready, discover, BringUpConfig, ChannelState, Controller, WaitError};
use ppcboot_pci::{enumerate, PciTag, PciWindowsConfig, ResourceWindows};
use ppcboot_sim::{SimBoard, SimDisk, SimDrive, SimFunction};

const TAG: PciTag = PciTag::new(0, 12, 0);

fn boot(primary: SimDrive) -> (SimBoard, Controller) {
    let mut board = SimBoard::new();
    board
        .attach(TAG, SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(primary), None]))
        .unwrap();
    enumerate(&mut board, &mut ResourceWindows::new(PciWindowsConfig::default()));
    let mut controllers = discover(&mut board, &BringUpConfig::default());
    (board, controllers.remove(0))
}

#[test]
fn permanently_busy_register_fails_within_the_budget() {
    let (mut board, controller) = boot(SimDrive::new("D", SimDisk::new(64)));
    board.channel_mut(TAG, 0).unwrap().drive_mut().unwrap().stuck_busy = true;
    let regs = controller.channel(0).unwrap().registers();

    for budget in [0, 1, 150, 1000] {
        let before = board.clock().now_us();
        let result = await_ready(&mut board, regs, budget);
        let elapsed = board.clock().now_us() - before;
        assert_eq!(result, Err(WaitError::StillBusy { status: 0x80 }));
        assert!(elapsed <= u64::from(budget) * 1000, "budget {budget}: {elapsed} us");
    }
}

#[test]
fn floating_bus_is_reported_as_no_device_at_once() {
    let (mut board, controller) = boot(SimDrive::new("D", SimDisk::new(64)));
    let empty = controller.channel(1).unwrap();
    assert_eq!(empty.state(), ChannelState::Absent);

    let before = board.clock().now_us();
    assert_eq!(
        await_ready(&mut board, empty.registers(), 1000),
        Err(WaitError::NoDevice)
    );
    assert_eq!(board.clock().now_us(), before);
}

#[test]
fn aborted_command_reports_status_and_error() {
    let (mut board, controller) = boot(SimDrive::new("D", SimDisk::new(64)));
    let regs = controller.channel(0).unwrap().registers();
    regs.write_reg(&mut board, ATA_REG_STATUS_COMMAND, 0x99);
    assert_eq!(
        await_ready(&mut board, regs, 10),
        Err(WaitError::DeviceError {
            status: 0x41,
            error: 0x04
        })
    );
}

#[test]
fn slow_reset_completes_inside_the_reset_budget() {
    let (board, controller) = boot(SimDrive::new("D", SimDisk::new(64)).with_reset_busy_polls(120));
    assert_eq!(controller.channel(0).unwrap().state(), ChannelState::Active);
    assert!(board.clock().now_ms() >= 120);

    let (_, controller) = boot(SimDrive::new("D", SimDisk::new(64)).with_reset_busy_polls(400));
    assert_eq!(controller.channel(0).unwrap().state(), ChannelState::Absent);
}
