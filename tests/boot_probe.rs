use ppcboot::disk::{DiskError, FsFormat};
use ppcboot::pci::regs::{PPB_SECONDARY_BUS_REG, PPB_SUBORDINATE_BUS_REG};
use ppcboot::pci::{PciTag, WindowKind};
use ppcboot::platform::PciConfigAccess;
use ppcboot::{BootConfig, BootContext, BootError};
use ppcboot_sim::{SimBoard, SimDisk, SimDrive, SimFunction};

const BRIDGE: PciTag = PciTag::new(0, 2, 0);
const SATA: PciTag = PciTag::new(1, 0, 0);
const NATIVE_IDE: PciTag = PciTag::new(0, 12, 0);
const LEGACY_IDE: PciTag = PciTag::new(0, 13, 0);

fn ffs_disk() -> SimDisk {
    let mut disk = SimDisk::new(4096);
    let w32 = u32::to_be_bytes;
    disk.write(512, &w32(0x8256_4557)).unwrap();
    disk.write(512 + 132, &w32(0x8256_4557)).unwrap();
    disk.write(512 + 138, &1u16.to_be_bytes()).unwrap();
    disk.write(512 + 148, &w32(2048)).unwrap();
    disk.write(512 + 152, &w32(64)).unwrap();
    disk.write(512 + 160, &[7]).unwrap();
    disk.write(64 * 512 + 65536 + 1372, &w32(0x1954_0119)).unwrap();
    disk.write(70 * 512, b"kernel").unwrap();
    disk
}

fn board() -> SimBoard {
    let mut board = SimBoard::new();
    board.attach(BRIDGE, SimFunction::bridge(0x1011, 0x0026)).unwrap();
    board
        .attach(
            SATA,
            SimFunction::sii_sata(0x3112, vec![None, Some(SimDrive::new("SATA0", SimDisk::new(8192)))]),
        )
        .unwrap();
    board
        .attach(
            NATIVE_IDE,
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(SimDrive::new("NATIVE", ffs_disk())), None]),
        )
        .unwrap();
    board
        .attach(
            LEGACY_IDE,
            SimFunction::pci_ide(
                0x1106,
                0x0571,
                0x8A,
                [None, Some(SimDrive::new("LEGACY", SimDisk::new(2048)))],
            ),
        )
        .unwrap();
    board
}

fn probed() -> BootContext<SimBoard> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut ctx = BootContext::new(board(), BootConfig::default());
    assert_eq!(ctx.probe(), 3);
    ctx
}

#[test]
fn probe_finds_every_drive_in_bus_order() {
    let ctx = probed();
    let found: Vec<(&str, &str)> = ctx.disks().iter().map(|d| (d.name(), d.model())).collect();
    assert_eq!(
        found,
        vec![("wd0", "SATA0"), ("wd1", "NATIVE"), ("wd2", "LEGACY")]
    );
    assert_eq!(ctx.disks()[0].channel(), 1);
}

#[test]
fn windows_are_disjoint_and_inside_the_board_ranges() {
    let mut ctx = probed();
    let pci = ctx.config().pci.clone();
    let placements = ctx.placements().to_vec();
    assert!(placements.iter().any(|p| p.tag == SATA));
    assert!(!placements.iter().any(|p| p.tag == LEGACY_IDE));
    for (i, a) in placements.iter().enumerate() {
        let (lo, hi) = match a.kind {
            WindowKind::Io => (pci.io_base, pci.io_end),
            WindowKind::Mem => (pci.mem_base, pci.mem_end),
        };
        assert!(a.base >= lo && a.end_exclusive() <= u64::from(hi), "{a:?}");
        for b in &placements[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }

    let board = ctx.board_mut();
    assert_eq!(board.read_config_u8(BRIDGE, PPB_SECONDARY_BUS_REG), 1);
    assert_eq!(board.read_config_u8(BRIDGE, PPB_SUBORDINATE_BUS_REG), 1);
}

#[test]
fn loader_reads_a_file_system_partition() {
    let mut ctx = probed();
    let file = ctx.open(1, 0).unwrap();
    assert_eq!(ctx.fs_format(file), Ok(Some(FsFormat::FfsV2)));
    assert_eq!(ctx.file(file).unwrap().offset, 64);

    let mut buf = [0u8; 512];
    assert_eq!(ctx.strategy(file, 6, &mut buf), Ok(512));
    assert_eq!(&buf[..6], b"kernel");
    ctx.close(file).unwrap();
    assert_eq!(
        ctx.strategy(file, 6, &mut buf),
        Err(BootError::Disk(DiskError::NotOpen))
    );
}

#[test]
fn nothing_opens_before_probe() {
    let mut ctx = BootContext::new(board(), BootConfig::default());
    assert!(ctx.disks().is_empty());
    assert_eq!(ctx.open(0, 0), Err(BootError::NotProbed));
    assert_eq!(ctx.open_raw(0, 2), Err(BootError::NotProbed));
}
