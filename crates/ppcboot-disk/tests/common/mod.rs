#![allow(dead_code)]

use ppcboot_ata::{discover, BringUpConfig};
use ppcboot_disk::{LabelConfig, Storage};
use ppcboot_pci::{enumerate, PciTag, PciWindowsConfig, ResourceWindows};
use ppcboot_sim::{SimBoard, SimDisk, SimDrive, SimFunction};

pub const IDE_TAG: PciTag = PciTag::new(0, 12, 0);
pub const SATA_TAG: PciTag = PciTag::new(0, 13, 0);

pub const DISKMAGIC: u32 = 0x8256_4557;
pub const FFS2_MAGIC: u32 = 0x1954_0119;
pub const FFS1_MAGIC: u32 = 0x0001_1954;

/// Writes a boot sector with one table entry of `kind` starting at `start`.
pub fn write_mbr(disk: &mut SimDisk, slot: usize, kind: u8, start: u32, size: u32) {
    let entry = 446 + slot as u64 * 16;
    disk.write(entry + 4, &[kind]).unwrap();
    disk.write(entry + 8, &start.to_le_bytes()).unwrap();
    disk.write(entry + 12, &size.to_le_bytes()).unwrap();
    disk.write(510, &[0x55, 0xAA]).unwrap();
}

/// Writes a disklabel at byte `at` of `sector`. Partitions are `(size, offset, fstype)`.
pub fn write_label(disk: &mut SimDisk, sector: u64, at: u64, big_endian: bool, parts: &[(u32, u32, u8)]) {
    let w32 = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let w16 = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let base = sector * 512 + at;
    disk.write(base, &w32(DISKMAGIC)).unwrap();
    disk.write(base + 132, &w32(DISKMAGIC)).unwrap();
    disk.write(base + 138, &w16(parts.len() as u16)).unwrap();
    for (i, &(size, offset, fstype)) in parts.iter().enumerate() {
        let p = base + 148 + i as u64 * 16;
        disk.write(p, &w32(size)).unwrap();
        disk.write(p + 4, &w32(offset)).unwrap();
        disk.write(p + 12, &[fstype]).unwrap();
    }
}

/// Places a superblock magic `sb_offset` bytes into the partition starting at `start`.
pub fn write_fs_magic(disk: &mut SimDisk, start: u64, sb_offset: u64, magic: u32) {
    disk.write(start * 512 + sb_offset + 1372, &magic.to_be_bytes()).unwrap();
}

/// Stamps each sector in `range` with its own number.
pub fn stamp(disk: &mut SimDisk, range: std::ops::Range<u64>) {
    for lba in range {
        disk.write(lba * 512 + 8, &lba.to_le_bytes()).unwrap();
    }
}

pub fn stamp_of(sector: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&sector[8..16]);
    u64::from_le_bytes(b)
}

pub fn enumerated(board: &mut SimBoard) {
    enumerate(board, &mut ResourceWindows::new(PciWindowsConfig::default()));
}

/// One native-mode IDE controller with `disk` on the primary channel, scanned.
pub fn single_disk(model: &str, disk: SimDisk) -> (SimBoard, Storage) {
    let mut board = SimBoard::new();
    board
        .attach(
            IDE_TAG,
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(SimDrive::new(model, disk)), None]),
        )
        .unwrap();
    let storage = scanned(&mut board);
    (board, storage)
}

pub fn scanned(board: &mut SimBoard) -> Storage {
    enumerated(board);
    let cfg = BringUpConfig::default();
    let mut storage = Storage::new(discover(board, &cfg), LabelConfig::default(), cfg);
    storage.scan(board);
    storage
}
