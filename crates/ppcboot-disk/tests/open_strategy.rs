mod common;

use common::*;
use ppcboot_disk::label::{FS_BSDFFS, FS_SWAP};
use ppcboot_disk::{DiskError, FsFormat, RAW_PART};
use ppcboot_sim::SimDisk;

const A_OFFSET: u32 = 2048;
const A_SIZE: u32 = 4096;

fn labelled_disk() -> SimDisk {
    let mut disk = SimDisk::new(1 << 14);
    stamp(&mut disk, 0..(1 << 14));
    write_mbr(&mut disk, 0, 0xA9, A_OFFSET, 8192);
    write_label(
        &mut disk,
        u64::from(A_OFFSET) + 1,
        0,
        true,
        &[
            (A_SIZE, A_OFFSET, FS_BSDFFS),
            (1024, 6144, FS_SWAP),
        ],
    );
    write_fs_magic(&mut disk, u64::from(A_OFFSET), 65536, FFS2_MAGIC);
    disk
}

#[test]
fn partition_blocks_are_translated_by_the_label_offset() {
    let (mut board, mut storage) = single_disk("LABELLED", labelled_disk());
    let file = storage.open(&mut board, 0, 0).unwrap();
    assert_eq!(storage.fs_format(file), Ok(Some(FsFormat::FfsV2)));

    let mut buf = vec![0u8; 2 * 512];
    assert_eq!(storage.strategy(&mut board, file, 10, &mut buf), Ok(1024));
    assert_eq!(stamp_of(&buf), u64::from(A_OFFSET) + 10);
    assert_eq!(stamp_of(&buf[512..]), u64::from(A_OFFSET) + 11);
}

#[test]
fn reads_past_the_partition_end_are_refused() {
    let (mut board, mut storage) = single_disk("LABELLED", labelled_disk());
    let file = storage.open(&mut board, 0, 0).unwrap();

    let mut buf = vec![0u8; 4 * 512];
    assert_eq!(
        storage.strategy(&mut board, file, u64::from(A_SIZE) - 2, &mut buf),
        Err(DiskError::OutOfBounds {
            block: u64::from(A_SIZE) - 2,
            count: 4,
            size: u64::from(A_SIZE),
        })
    );
    let mut odd = vec![0u8; 700];
    assert_eq!(
        storage.strategy(&mut board, file, 0, &mut odd),
        Err(DiskError::UnalignedLength { len: 700, alignment: 512 })
    );
}

#[test]
fn partition_without_a_filesystem_opens_only_raw() {
    let (mut board, mut storage) = single_disk("LABELLED", labelled_disk());
    assert_eq!(storage.open(&mut board, 0, 1), Err(DiskError::FormatMismatch));

    let file = storage.open_raw(0, 1).unwrap();
    assert_eq!(storage.fs_format(file), Ok(None));
    let mut buf = [0u8; 512];
    storage.strategy(&mut board, file, 0, &mut buf).unwrap();
    assert_eq!(stamp_of(&buf), 6144);
}

#[test]
fn older_filesystem_is_recognised_after_the_newer_reader_declines() {
    let mut disk = SimDisk::new(1 << 12);
    write_label(&mut disk, 1, 0, true, &[(1024, 64, FS_BSDFFS)]);
    write_fs_magic(&mut disk, 64, 8192, FFS1_MAGIC);
    let (mut board, mut storage) = single_disk("OLDFS", disk);

    let file = storage.open(&mut board, 0, 0).unwrap();
    assert_eq!(storage.fs_format(file), Ok(Some(FsFormat::FfsV1)));
}

#[test]
fn raw_partition_covers_the_whole_disk_when_the_label_omits_it() {
    let (mut board, mut storage) = single_disk("LABELLED", labelled_disk());
    let file = storage.open_raw(0, RAW_PART).unwrap();
    let part = *storage.file(file).unwrap();
    assert_eq!((part.offset, part.size), (0, 1 << 14));

    let mut buf = [0u8; 512];
    storage.strategy(&mut board, file, 5, &mut buf).unwrap();
    assert_eq!(stamp_of(&buf), 5);

    assert_eq!(
        storage.open_raw(0, 3),
        Err(DiskError::NoSuchPartition { unit: 0, partition: 3 })
    );
}

#[test]
fn unlabelled_disk_opens_as_one_device() {
    let mut disk = SimDisk::new(1 << 12);
    stamp(&mut disk, 0..16);
    let (mut board, mut storage) = single_disk("PLAIN", disk);

    let file = storage.open_raw(0, 5).unwrap();
    let mut buf = [0u8; 512];
    storage.strategy(&mut board, file, 7, &mut buf).unwrap();
    assert_eq!(stamp_of(&buf), 7);
    assert_eq!(
        storage.open_raw(0, 16),
        Err(DiskError::NoSuchPartition { unit: 0, partition: 16 })
    );
    assert_eq!(storage.open_raw(1, 0), Err(DiskError::NoSuchUnit { unit: 1 }));
}

#[test]
fn closed_files_refuse_io_and_slots_are_reused() {
    let (mut board, mut storage) = single_disk("LABELLED", labelled_disk());
    let first = storage.open(&mut board, 0, 0).unwrap();
    storage.close(first).unwrap();
    assert_eq!(storage.close(first), Err(DiskError::NotOpen));

    let mut buf = [0u8; 512];
    assert_eq!(
        storage.strategy(&mut board, first, 0, &mut buf),
        Err(DiskError::NotOpen)
    );

    let second = storage.open_raw(0, 1).unwrap();
    assert_eq!(second, first);
}
