use std::fs;

use anyhow::{bail, Context};
use ppcboot::pci::PciTag;
use ppcboot_sim::{SimBoard, SimDisk, SimDrive, SimFunction};

use crate::{Args, ControllerKind};

const BRIDGE_TAG: PciTag = PciTag::new(0, 2, 0);
const SLOT: u8 = 12;

/// Loads the images and wires them onto a board with one storage controller.
pub fn build(args: &Args) -> anyhow::Result<SimBoard> {
    let ports = match args.controller {
        ControllerKind::Ide | ControllerKind::LegacyIde | ControllerKind::Sii3112 => 2,
        ControllerKind::Sii3114 => 4,
    };
    if args.images.len() > ports {
        bail!(
            "{:?} has {ports} channels, got {} images",
            args.controller,
            args.images.len()
        );
    }

    let mut drives: Vec<Option<SimDrive>> = Vec::with_capacity(ports);
    for (n, path) in args.images.iter().enumerate() {
        let image = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let disk = SimDisk::from_image(&image)
            .with_context(|| format!("load image {}", path.display()))?;
        let mut drive = SimDrive::new(format!("PPCBOOT SIM DISK {n}"), disk);
        if let Some(pulses) = args.standby {
            drive = drive.in_standby(pulses);
        }
        drives.push(Some(drive));
    }
    drives.resize_with(ports, || None);

    let function = match args.controller {
        ControllerKind::Ide | ControllerKind::LegacyIde => {
            let mut pair = drives.into_iter();
            let channels = [pair.next().flatten(), pair.next().flatten()];
            if args.controller == ControllerKind::Ide {
                SimFunction::pci_ide(0x1283, 0x8211, 0x8F, channels)
            } else {
                SimFunction::pci_ide(0x1106, 0x0571, 0x8A, channels)
            }
        }
        ControllerKind::Sii3112 => SimFunction::sii_sata(0x3112, drives),
        ControllerKind::Sii3114 => SimFunction::sii_sata(0x3114, drives),
    };

    let mut board = SimBoard::new();
    let tag = if args.behind_bridge {
        board.attach(BRIDGE_TAG, SimFunction::bridge(0x1011, 0x0026))?;
        PciTag::new(1, 0, 0)
    } else {
        PciTag::new(0, SLOT, 0)
    };
    board.attach(tag, function)?;
    Ok(board)
}
