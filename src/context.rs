use ppcboot_ata::discover;
use ppcboot_disk::{Disk, FileId, FsFormat, OpenPartition, Storage};
use ppcboot_pci::{enumerate, Placement, ResourceWindows};
use ppcboot_platform::Board;
use tracing::info;

use crate::config::BootConfig;
use crate::error::{BootError, Result};

/// The board plus everything the boot path discovered on it.
#[derive(Debug)]
pub struct BootContext<B> {
    board: B,
    config: BootConfig,
    windows: ResourceWindows,
    placements: Vec<Placement>,
    storage: Option<Storage>,
}

impl<B: Board> BootContext<B> {
    pub fn new(board: B, config: BootConfig) -> Self {
        Self {
            windows: ResourceWindows::new(config.pci.clone()),
            board,
            config,
            placements: Vec::new(),
            storage: None,
        }
    }

    /// Walks the bus, brings up every storage controller and scans the drives. Returns the
    /// number of disks found.
    ///
    /// Nothing here fails the boot: unplaceable windows, dead channels and unreadable labels
    /// are logged and leave the affected device unusable.
    pub fn probe(&mut self) -> usize {
        self.placements = enumerate(&mut self.board, &mut self.windows);
        let controllers = discover(&mut self.board, &self.config.ata);
        info!(
            windows = self.placements.len(),
            controllers = controllers.len(),
            "bus probed"
        );
        let mut storage = Storage::new(
            controllers,
            self.config.label.clone(),
            self.config.ata.clone(),
        );
        let disks = storage.scan(&mut self.board);
        self.storage = Some(storage);
        disks
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn into_board(self) -> B {
        self.board
    }

    pub fn windows(&self) -> &ResourceWindows {
        &self.windows
    }

    /// Windows placed by the last probe.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn storage(&self) -> Result<&Storage> {
        self.storage.as_ref().ok_or(BootError::NotProbed)
    }

    pub fn disks(&self) -> &[Disk] {
        match &self.storage {
            Some(storage) => storage.disks(),
            None => &[],
        }
    }

    fn parts(&mut self) -> Result<(&mut B, &mut Storage)> {
        let storage = self.storage.as_mut().ok_or(BootError::NotProbed)?;
        Ok((&mut self.board, storage))
    }

    pub fn read_blocks(&mut self, unit: usize, start: u64, count: u32, buf: &mut [u8]) -> Result<()> {
        let (board, storage) = self.parts()?;
        Ok(storage.read_blocks(board, unit, start, count, buf)?)
    }

    pub fn open(&mut self, unit: usize, partition: u8) -> Result<FileId> {
        let (board, storage) = self.parts()?;
        Ok(storage.open(board, unit, partition)?)
    }

    pub fn open_raw(&mut self, unit: usize, partition: u8) -> Result<FileId> {
        let (_, storage) = self.parts()?;
        Ok(storage.open_raw(unit, partition)?)
    }

    pub fn close(&mut self, file: FileId) -> Result<()> {
        let (_, storage) = self.parts()?;
        Ok(storage.close(file)?)
    }

    pub fn strategy(&mut self, file: FileId, block: u64, buf: &mut [u8]) -> Result<usize> {
        let (board, storage) = self.parts()?;
        Ok(storage.strategy(board, file, block, buf)?)
    }

    pub fn file(&self, file: FileId) -> Result<OpenPartition> {
        Ok(*self.storage()?.file(file)?)
    }

    pub fn fs_format(&self, file: FileId) -> Result<Option<FsFormat>> {
        Ok(self.storage()?.fs_format(file)?)
    }
}
