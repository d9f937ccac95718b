use ppcboot_ata::IdentifyData;

use crate::error::{DiskError, Result};
use crate::label::DiskLabel;

/// Disk table capacity.
pub const MAX_DISKS: usize = 4;

/// A drive found on an active channel.
#[derive(Debug, Clone)]
pub struct Disk {
    name: String,
    controller: usize,
    channel: usize,
    ident: IdentifyData,
    model: String,
    label: Option<DiskLabel>,
    label_origin: u64,
}

impl Disk {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the owning controller in the storage stack.
    pub fn controller(&self) -> usize {
        self.controller
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn identify(&self) -> &IdentifyData {
        &self.ident
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sectors(&self) -> u64 {
        self.ident.sectors()
    }

    pub fn capacity_mb(&self) -> u64 {
        self.ident.capacity_mb()
    }

    pub fn label(&self) -> Option<&DiskLabel> {
        self.label.as_ref()
    }

    /// Sector the label search started from.
    pub fn label_origin(&self) -> u64 {
        self.label_origin
    }

    pub(crate) fn set_label(&mut self, origin: u64, label: Option<DiskLabel>) {
        self.label_origin = origin;
        self.label = label;
    }
}

/// Fixed-capacity table of disks, named `wd0`, `wd1`, ... in discovery order.
#[derive(Debug, Clone, Default)]
pub struct DiskTable {
    disks: Vec<Disk>,
}

impl DiskTable {
    pub fn new() -> Self {
        Self {
            disks: Vec::with_capacity(MAX_DISKS),
        }
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.disks.len() >= MAX_DISKS
    }

    pub fn clear(&mut self) {
        self.disks.clear();
    }

    /// Appends a disk and returns its unit number.
    pub fn push(&mut self, controller: usize, channel: usize, ident: IdentifyData) -> Result<usize> {
        if self.is_full() {
            return Err(DiskError::TableFull {
                capacity: MAX_DISKS,
            });
        }
        let unit = self.disks.len();
        let model = ident.model();
        self.disks.push(Disk {
            name: format!("wd{unit}"),
            controller,
            channel,
            ident,
            model,
            label: None,
            label_origin: 0,
        });
        Ok(unit)
    }

    pub fn get(&self, unit: usize) -> Result<&Disk> {
        self.disks.get(unit).ok_or(DiskError::NoSuchUnit { unit })
    }

    pub(crate) fn get_mut(&mut self, unit: usize) -> Result<&mut Disk> {
        self.disks.get_mut(unit).ok_or(DiskError::NoSuchUnit { unit })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Disk> {
        self.disks.iter()
    }

    pub fn as_slice(&self) -> &[Disk] {
        &self.disks
    }
}
