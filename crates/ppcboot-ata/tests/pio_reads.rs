use ppcboot_ata::{
    discover, AtaError, BringUpConfig, Controller, WaitError, LBA28_LIMIT, LBA48_LIMIT,
};
use ppcboot_pci::{enumerate, PciTag, PciWindowsConfig, ResourceWindows};
use ppcboot_sim::{SimBoard, SimCommand, SimDisk, SimDrive, SimFunction};

const TAG: PciTag = PciTag::new(0, 12, 0);

fn marked_disk(sectors: u64, marked: std::ops::Range<u64>) -> SimDisk {
    let mut disk = SimDisk::new(sectors);
    for lba in marked {
        disk.write(lba * 512, &lba.to_le_bytes()).unwrap();
        disk.write(lba * 512 + 504, &(!lba).to_le_bytes()).unwrap();
    }
    disk
}

fn boot(drive: SimDrive) -> (SimBoard, Controller) {
    let mut board = SimBoard::new();
    board
        .attach(TAG, SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive), None]))
        .unwrap();
    enumerate(&mut board, &mut ResourceWindows::new(PciWindowsConfig::default()));
    let mut controllers = discover(&mut board, &BringUpConfig::default());
    let controller = controllers.remove(0);
    board.channel_mut(TAG, 0).unwrap().clear_commands();
    (board, controller)
}

fn reads(board: &SimBoard) -> Vec<(u64, u32, bool)> {
    board
        .channel(TAG, 0)
        .unwrap()
        .commands()
        .iter()
        .filter_map(|c| match *c {
            SimCommand::Read { lba, count, ext } => Some((lba, count, ext)),
            _ => None,
        })
        .collect()
}

fn assert_marked(buf: &[u8], first: u64) {
    for (i, sector) in buf.chunks_exact(512).enumerate() {
        let lba = first + i as u64;
        assert_eq!(sector[..8], lba.to_le_bytes(), "sector {lba}");
        assert_eq!(sector[504..], (!lba).to_le_bytes(), "sector {lba}");
    }
}

#[test]
fn request_straddling_the_28_bit_boundary_switches_command_form_per_chunk() {
    let start = LBA28_LIMIT - 10;
    let disk = marked_disk(LBA28_LIMIT + 4096, start..start + 300);
    let (mut board, controller) = boot(SimDrive::new("BIG", disk));

    let mut buf = vec![0u8; 300 * 512];
    controller
        .read_sectors(&mut board, 0, start, 300, &mut buf, 1000)
        .unwrap();

    assert_marked(&buf, start);
    assert_eq!(
        reads(&board),
        vec![(start, 255, false), (start + 255, 45, true)]
    );
}

#[test]
fn reads_are_idempotent() {
    let disk = marked_disk(1 << 16, 0..600);
    let (mut board, controller) = boot(SimDrive::new("SMALL", disk).lba28_only());

    let mut first = vec![0u8; 520 * 512];
    let mut second = vec![0xAAu8; 520 * 512];
    controller
        .read_sectors(&mut board, 0, 40, 520, &mut first, 1000)
        .unwrap();
    controller
        .read_sectors(&mut board, 0, 40, 520, &mut second, 1000)
        .unwrap();

    assert_eq!(first, second);
    assert_marked(&first, 40);
    assert_eq!(
        reads(&board),
        vec![
            (40, 255, false),
            (295, 255, false),
            (550, 10, false),
            (40, 255, false),
            (295, 255, false),
            (550, 10, false),
        ]
    );
}

#[test]
fn stalled_transfer_is_an_io_error_naming_the_block() {
    let (mut board, controller) = boot(SimDrive::new("STALL", SimDisk::new(1 << 16)));
    board.channel_mut(TAG, 0).unwrap().drive_mut().unwrap().stuck_busy = true;

    let before = board.clock().now_us();
    let mut buf = vec![0u8; 4 * 512];
    let err = controller
        .read_sectors(&mut board, 0, 100, 4, &mut buf, 1000)
        .unwrap_err();

    assert_eq!(
        err,
        AtaError::Timeout {
            block: 100,
            source: WaitError::StillBusy { status: 0x80 }
        }
    );
    assert!(board.clock().now_us() - before <= 1_000_000);
    // No retry.
    assert_eq!(reads(&board).len(), 1);
}

#[test]
fn drive_rejecting_the_range_fails_the_request() {
    let (mut board, controller) = boot(SimDrive::new("TINY", SimDisk::new(64)));
    let mut buf = vec![0u8; 8 * 512];
    let err = controller
        .read_sectors(&mut board, 0, 60, 8, &mut buf, 1000)
        .unwrap_err();
    assert!(matches!(
        err,
        AtaError::Timeout {
            block: 60,
            source: WaitError::DeviceError { error: 0x10, .. }
        }
    ));
}

#[test]
fn short_buffers_and_absent_channels_are_refused_up_front() {
    let (mut board, controller) = boot(SimDrive::new("X", SimDisk::new(64)));
    let mut buf = vec![0u8; 511];
    assert_eq!(
        controller.read_sectors(&mut board, 0, 0, 1, &mut buf, 1000),
        Err(AtaError::BufferTooSmall { len: 511, sectors: 1 })
    );
    let mut buf = vec![0u8; 512];
    assert_eq!(
        controller.read_sectors(&mut board, 1, 0, 1, &mut buf, 1000),
        Err(AtaError::ChannelAbsent { channel: 1 })
    );
    assert!(reads(&board).is_empty());
}

#[test]
fn ranges_past_the_48_bit_space_are_unsupported_even_when_they_wrap() {
    let (mut board, controller) = boot(SimDrive::new("X", SimDisk::new(64)));
    let mut buf = vec![0u8; 2 * 512];
    for start in [LBA48_LIMIT - 1, u64::MAX - 1, u64::MAX] {
        assert_eq!(
            controller.read_sectors(&mut board, 0, start, 2, &mut buf, 1000),
            Err(AtaError::Unsupported { block: start }),
            "start {start:#x}"
        );
    }
    assert!(reads(&board).is_empty());
}

#[test]
fn identify_and_pio_mode_setup() {
    let (mut board, mut controller) =
        boot(SimDrive::new("ST3500641AS", SimDisk::new(976_773_168)));

    let id = controller.identify(&mut board, 0, 1000).unwrap();
    assert_eq!(id.model(), "ST3500641AS");
    assert_eq!(id.sectors(), 976_773_168);
    assert_eq!(id.capacity_mb(), 476_940);

    controller.set_pio_mode(&mut board, 0, 1000).unwrap();
    assert_eq!(
        board.channel(TAG, 0).unwrap().commands(),
        &[
            SimCommand::Identify,
            SimCommand::SetFeatures {
                feature: 0x03,
                count: 0x08
            }
        ]
    );
}
