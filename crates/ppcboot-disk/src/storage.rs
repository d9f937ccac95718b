//! Disk discovery and the open/close/strategy entry points the loader calls.

use ppcboot_ata::{AtaError, BringUpConfig, Controller};
use ppcboot_platform::{Delay, RegisterIo};
use tracing::{debug, info, warn};

use crate::disk::{Disk, DiskTable, MAX_DISKS};
use crate::error::{DiskError, Result};
use crate::fs::{self, BlockSource, FsFormat};
use crate::label::{label_origin, partition_letter, DiskLabel, LabelConfig, MAXPARTITIONS, RAW_PART};
use crate::SECTOR_SIZE;

/// Handle of an open partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

/// Where an open partition lives on its disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPartition {
    pub unit: usize,
    pub partition: u8,
    /// First disk sector of the partition.
    pub offset: u64,
    /// Length in sectors.
    pub size: u64,
    /// Filesystem recognised at open time; `None` for raw opens.
    pub format: Option<FsFormat>,
}

/// Controllers, the disks found on them and the open-file table.
#[derive(Debug)]
pub struct Storage {
    controllers: Vec<Controller>,
    disks: DiskTable,
    label_cfg: LabelConfig,
    io_cfg: BringUpConfig,
    files: Vec<Option<OpenPartition>>,
}

impl Storage {
    pub fn new(controllers: Vec<Controller>, label_cfg: LabelConfig, io_cfg: BringUpConfig) -> Self {
        Self {
            controllers,
            disks: DiskTable::new(),
            label_cfg,
            io_cfg,
            files: Vec::new(),
        }
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn disks(&self) -> &[Disk] {
        self.disks.as_slice()
    }

    pub fn disk(&self, unit: usize) -> Result<&Disk> {
        self.disks.get(unit)
    }

    pub fn label(&self, unit: usize) -> Result<&DiskLabel> {
        let disk = self.disks.get(unit)?;
        disk.label().ok_or_else(|| DiskError::NoLabel {
            disk: disk.name().to_string(),
        })
    }

    /// Identifies the drive on every active channel, fills the disk table and decodes each
    /// disk's label. Returns the number of disks found.
    ///
    /// Any previous table and every open file are discarded.
    pub fn scan<B: RegisterIo + Delay + ?Sized>(&mut self, io: &mut B) -> usize {
        self.disks.clear();
        self.files.clear();
        let budget = self.io_cfg.identify_budget_ms;

        'controllers: for (index, controller) in self.controllers.iter_mut().enumerate() {
            let active: Vec<usize> = controller.active_channels().collect();
            for channel in active {
                if self.disks.is_full() {
                    warn!(capacity = MAX_DISKS, "disk table full, ignoring remaining drives");
                    break 'controllers;
                }
                let ident = match controller.identify(io, channel, budget) {
                    Ok(ident) => ident,
                    Err(err) => {
                        warn!(tag = %controller.tag(), channel, %err, "IDENTIFY failed");
                        continue;
                    }
                };
                if let Err(err) = controller.set_pio_mode(io, channel, budget) {
                    warn!(tag = %controller.tag(), channel, %err, "SET FEATURES failed");
                }
                match self.disks.push(index, channel, ident) {
                    Ok(unit) => {
                        if let Ok(disk) = self.disks.get(unit) {
                            info!("{}: <{}> {} MB", disk.name(), disk.model(), disk.capacity_mb());
                            debug!(
                                disk = disk.name(),
                                addressing = ?disk.identify().addressing(),
                                dma = disk.identify().supports_dma(),
                                sectors = disk.sectors(),
                                "drive parameters"
                            );
                        }
                    }
                    Err(err) => {
                        warn!(%err, "dropping drive");
                        break 'controllers;
                    }
                }
            }
        }

        for unit in 0..self.disks.len() {
            self.load_label(io, unit);
        }
        self.disks.len()
    }

    fn load_label<B: RegisterIo + Delay + ?Sized>(&mut self, io: &mut B, unit: usize) {
        let Ok(name) = self.disks.get(unit).map(|d| d.name().to_string()) else {
            return;
        };
        let mut sector = [0u8; SECTOR_SIZE];
        if let Err(err) = self.read_blocks(io, unit, 0, 1, &mut sector) {
            warn!(disk = %name, %err, "cannot read boot sector");
            return;
        }
        let origin = label_origin(&sector, self.label_cfg.partition_type);
        let label = match self.read_blocks(io, unit, origin + self.label_cfg.label_sector, 1, &mut sector) {
            Ok(()) => DiskLabel::find(&sector),
            Err(err) => {
                warn!(disk = %name, %err, "cannot read label sector");
                None
            }
        };

        match &label {
            Some(label) => {
                for (i, part) in label.partitions.iter().enumerate() {
                    if part.is_used() {
                        info!("{}{}: {}", name, partition_letter(i), part.kind());
                    }
                }
            }
            None => info!("{name}: no disklabel"),
        }
        if let Ok(disk) = self.disks.get_mut(unit) {
            disk.set_label(origin, label);
        }
    }

    /// Reads `count` sectors of a whole disk starting at `start`.
    pub fn read_blocks<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        unit: usize,
        start: u64,
        count: u32,
        buf: &mut [u8],
    ) -> Result<()> {
        let disk = self.disks.get(unit)?;
        let size = disk.sectors();
        if start.checked_add(u64::from(count)).map_or(true, |end| end > size) {
            return Err(DiskError::OutOfBounds {
                block: start,
                count: u64::from(count),
                size,
            });
        }
        let controller = self
            .controllers
            .get(disk.controller())
            .ok_or(DiskError::NoSuchUnit { unit })?;
        controller
            .read_sectors(io, disk.channel(), start, count, buf, self.io_cfg.sector_budget_ms)
            .map_err(|source| DiskError::Io {
                disk: disk.name().to_string(),
                block: match &source {
                    AtaError::Timeout { block, .. } => *block,
                    _ => start,
                },
                source,
            })
    }

    fn resolve(&self, unit: usize, partition: u8) -> Result<OpenPartition> {
        let disk = self.disks.get(unit)?;
        if usize::from(partition) >= MAXPARTITIONS {
            return Err(DiskError::NoSuchPartition { unit, partition });
        }
        let whole = OpenPartition {
            unit,
            partition,
            offset: 0,
            size: disk.sectors(),
            format: None,
        };
        let Some(label) = disk.label() else {
            return Ok(whole);
        };
        match label.partition(partition) {
            Some(p) if p.size != 0 => Ok(OpenPartition {
                offset: p.offset,
                size: p.size,
                ..whole
            }),
            _ if partition == RAW_PART => Ok(whole),
            _ => Err(DiskError::NoSuchPartition { unit, partition }),
        }
    }

    /// Opens a partition and recognises its filesystem, newest format first.
    pub fn open<B: RegisterIo + Delay + ?Sized>(
        &mut self,
        io: &mut B,
        unit: usize,
        partition: u8,
    ) -> Result<FileId> {
        let mut file = self.resolve(unit, partition)?;
        let mut src = PartitionReader {
            storage: &*self,
            io,
            file,
        };
        let format = fs::detect(&fs::default_readers(), &mut src)?;
        debug!(unit, partition, %format, "filesystem recognised");
        file.format = Some(format);
        Ok(self.install(file))
    }

    /// Opens a partition for block access only.
    pub fn open_raw(&mut self, unit: usize, partition: u8) -> Result<FileId> {
        let file = self.resolve(unit, partition)?;
        Ok(self.install(file))
    }

    fn install(&mut self, file: OpenPartition) -> FileId {
        match self.files.iter().position(Option::is_none) {
            Some(slot) => {
                self.files[slot] = Some(file);
                FileId(slot)
            }
            None => {
                self.files.push(Some(file));
                FileId(self.files.len() - 1)
            }
        }
    }

    pub fn close(&mut self, id: FileId) -> Result<()> {
        self.files
            .get_mut(id.0)
            .and_then(Option::take)
            .map(|_| ())
            .ok_or(DiskError::NotOpen)
    }

    pub fn file(&self, id: FileId) -> Result<&OpenPartition> {
        self.files
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DiskError::NotOpen)
    }

    pub fn fs_format(&self, id: FileId) -> Result<Option<FsFormat>> {
        Ok(self.file(id)?.format)
    }

    /// Reads whole sectors at partition block `block` into `buf`; returns the bytes moved.
    pub fn strategy<B: RegisterIo + Delay + ?Sized>(
        &self,
        io: &mut B,
        id: FileId,
        block: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let file = *self.file(id)?;
        read_partition(self, io, &file, block, buf)?;
        Ok(buf.len())
    }
}

fn read_partition<B: RegisterIo + Delay + ?Sized>(
    storage: &Storage,
    io: &mut B,
    file: &OpenPartition,
    block: u64,
    buf: &mut [u8],
) -> Result<()> {
    if buf.len() % SECTOR_SIZE != 0 {
        return Err(DiskError::UnalignedLength {
            len: buf.len(),
            alignment: SECTOR_SIZE,
        });
    }
    let count = (buf.len() / SECTOR_SIZE) as u64;
    let out_of_bounds = DiskError::OutOfBounds {
        block,
        count,
        size: file.size,
    };
    if block.checked_add(count).map_or(true, |end| end > file.size) {
        return Err(out_of_bounds);
    }
    if count == 0 {
        return Ok(());
    }
    let count = u32::try_from(count).map_err(|_| out_of_bounds)?;
    storage.read_blocks(io, file.unit, file.offset + block, count, buf)
}

struct PartitionReader<'a, B: ?Sized> {
    storage: &'a Storage,
    io: &'a mut B,
    file: OpenPartition,
}

impl<B: RegisterIo + Delay + ?Sized> BlockSource for PartitionReader<'_, B> {
    fn read_blocks(&mut self, block: u64, buf: &mut [u8]) -> Result<()> {
        read_partition(self.storage, self.io, &self.file, block, buf)
    }
}
