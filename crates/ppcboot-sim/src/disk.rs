use std::collections::BTreeMap;

use crate::error::{Result, SimError};

pub const SECTOR_SIZE: usize = 512;

/// Sparse in-memory disk. Sectors never written read back as zeros, so multi-terabyte
/// capacities cost nothing until populated.
#[derive(Debug, Clone, Default)]
pub struct SimDisk {
    sectors: u64,
    data: BTreeMap<u64, Box<[u8; SECTOR_SIZE]>>,
}

impl SimDisk {
    pub fn new(sectors: u64) -> Self {
        Self {
            sectors,
            data: BTreeMap::new(),
        }
    }

    /// Builds a disk holding exactly `image`.
    pub fn from_image(image: &[u8]) -> Result<Self> {
        if image.len() % SECTOR_SIZE != 0 {
            return Err(SimError::UnalignedImage { len: image.len() });
        }
        let mut disk = Self::new((image.len() / SECTOR_SIZE) as u64);
        disk.write(0, image)?;
        Ok(disk)
    }

    pub fn sectors(&self) -> u64 {
        self.sectors
    }

    pub fn read_sector(&self, lba: u64) -> Option<[u8; SECTOR_SIZE]> {
        if lba >= self.sectors {
            return None;
        }
        Some(self.data.get(&lba).map_or([0; SECTOR_SIZE], |s| **s))
    }

    /// Writes `bytes` at byte `offset`; used to lay out fixtures.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .filter(|&end| end <= self.sectors * SECTOR_SIZE as u64)
            .ok_or(SimError::PastEnd {
                offset,
                len: bytes.len(),
                sectors: self.sectors,
            })?;

        let mut pos = offset;
        while pos < end {
            let lba = pos / SECTOR_SIZE as u64;
            let within = (pos % SECTOR_SIZE as u64) as usize;
            let take = (SECTOR_SIZE - within).min((end - pos) as usize);
            let src = (pos - offset) as usize;
            let sector = self
                .data
                .entry(lba)
                .or_insert_with(|| Box::new([0; SECTOR_SIZE]));
            sector[within..within + take].copy_from_slice(&bytes[src..src + take]);
            pos += take as u64;
        }
        Ok(())
    }

    pub fn write_sector(&mut self, lba: u64, sector: &[u8; SECTOR_SIZE]) -> Result<()> {
        self.write(lba * SECTOR_SIZE as u64, sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_spanning_sectors_land_in_both() {
        let mut disk = SimDisk::new(4);
        disk.write(510, &[1, 2, 3, 4]).unwrap();
        let s0 = disk.read_sector(0).unwrap();
        let s1 = disk.read_sector(1).unwrap();
        assert_eq!(&s0[510..], &[1, 2]);
        assert_eq!(&s1[..2], &[3, 4]);
        assert_eq!(disk.read_sector(2).unwrap(), [0; SECTOR_SIZE]);
        assert_eq!(disk.read_sector(4), None);
    }

    #[test]
    fn out_of_range_writes_are_refused() {
        let mut disk = SimDisk::new(1);
        assert!(matches!(
            disk.write(511, &[0, 0]),
            Err(SimError::PastEnd { sectors: 1, .. })
        ));
        assert_eq!(
            SimDisk::from_image(&[0; 100]).unwrap_err(),
            SimError::UnalignedImage { len: 100 }
        );
    }
}
