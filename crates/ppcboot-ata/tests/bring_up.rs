use ppcboot_ata::{
    discover, BringUpConfig, ChannelState, ChipFamily, Controller, SiiChip, MAX_CONTROLLERS,
};
use ppcboot_pci::{enumerate, PciTag, PciWindowsConfig, ResourceWindows};
use ppcboot_platform::constants::pci_io_to_cpu;
use ppcboot_platform::PciConfigAccess;
use ppcboot_sim::{SimBoard, SimCommand, SimConfigAccess, SimDisk, SimDrive, SimFunction};

fn drive(model: &str) -> SimDrive {
    SimDrive::new(model, SimDisk::new(1 << 21))
}

fn boot(board: &mut SimBoard, cfg: &BringUpConfig) -> Vec<Controller> {
    enumerate(board, &mut ResourceWindows::new(PciWindowsConfig::default()));
    discover(board, cfg)
}

fn states(controller: &Controller) -> Vec<ChannelState> {
    controller.channels().iter().map(|c| c.state()).collect()
}

#[test]
fn sii3114_brings_up_populated_ports_only() {
    let tag = PciTag::new(0, 14, 0);
    let mut board = SimBoard::new();
    board
        .attach(
            tag,
            SimFunction::sii_sata(0x3114, vec![Some(drive("PORT0")), None, Some(drive("PORT2")), None]),
        )
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    assert_eq!(controllers.len(), 1);
    let sii = &controllers[0];
    assert_eq!(sii.chip(), ChipFamily::SiiSata(SiiChip::Sii3114));
    assert_eq!(
        states(sii),
        vec![
            ChannelState::Active,
            ChannelState::Absent,
            ChannelState::Active,
            ChannelState::Absent
        ]
    );
    assert_eq!(sii.active_channels().collect::<Vec<_>>(), vec![0, 2]);

    // Every port was taken through a link reset before its drive was touched.
    let log = board.channel(tag, 2).unwrap().commands();
    assert_eq!(log[0], SimCommand::LinkReset);
    assert!(log.contains(&SimCommand::SoftReset));

    // FIFO thresholds: 32-byte lines are four 8-byte units, plus one.
    let mmio = board.function(tag).unwrap().controller().unwrap();
    for fifo in [0x40, 0x44, 0x240, 0x244] {
        assert_eq!(mmio.scratch_byte(5, fifo), 5);
        assert_eq!(mmio.scratch_byte(5, fifo + 1), 5);
    }
}

#[test]
fn two_port_sii_keeps_task_files_in_io_space() {
    let tag = PciTag::new(0, 15, 0);
    let mut board = SimBoard::new();
    board
        .attach(tag, SimFunction::sii_sata(0x3512, vec![None, Some(drive("P1"))]))
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    let sii = &controllers[0];
    assert_eq!(states(sii), vec![ChannelState::Absent, ChannelState::Active]);
    let regs = sii.channel(1).unwrap().registers();
    assert!(regs.is_sata());
    assert!(regs.command_base() >= 0xFE00_0000);
}

#[test]
fn flaky_link_is_retried_once() {
    let tag = PciTag::new(0, 14, 0);
    let cfg = BringUpConfig::default();
    assert_eq!(cfg.sata_link_attempts, 2);

    for (failures, expected) in [(1, ChannelState::Active), (2, ChannelState::Absent)] {
        let mut board = SimBoard::new();
        let mut function = SimFunction::sii_sata(0x3112, vec![Some(drive("FLAKY")), None]);
        let port = function.controller_mut().unwrap().channel_mut(0).unwrap();
        *port = port.clone().with_failing_link_inits(failures);
        board.attach(tag, function).unwrap();

        let controllers = boot(&mut board, &cfg);
        assert_eq!(controllers[0].channel(0).unwrap().state(), expected, "{failures} failures");
    }
}

#[test]
fn standby_drive_is_woken_before_reset() {
    let tag = PciTag::new(0, 12, 0);
    let mut board = SimBoard::new();
    board
        .attach(
            tag,
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive("SLEEPY").in_standby(3)), None]),
        )
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    assert_eq!(controllers[0].channel(0).unwrap().state(), ChannelState::Active);

    let channel = board.channel(tag, 0).unwrap();
    assert_eq!(channel.drive().unwrap().wakes_seen(), 3);
    let wakes = channel
        .commands()
        .iter()
        .filter(|c| **c == SimCommand::IdleImmediate)
        .count();
    assert_eq!(wakes, 3);
    // One wake interval per pulse.
    assert!(board.clock().now_ms() >= 3000);
}

#[test]
fn drive_is_up_once_a_reset_completes_whatever_its_power_mode_reply() {
    let tag = PciTag::new(0, 12, 0);
    for sleepy in [
        drive("IDLE_A").with_power_code(0x81),
        drive("NO PM").aborting_power_mode(),
        drive("NO PM STANDBY").aborting_power_mode().in_standby(2),
    ] {
        let model = sleepy.model.clone();
        let wakes_needed = sleepy.wakes_needed.max(1) as usize;
        let mut board = SimBoard::new();
        board
            .attach(tag, SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(sleepy), None]))
            .unwrap();

        let controllers = boot(&mut board, &BringUpConfig::default());
        assert_eq!(
            controllers[0].channel(0).unwrap().state(),
            ChannelState::Active,
            "{model}"
        );
        let wakes = board
            .channel(tag, 0)
            .unwrap()
            .commands()
            .iter()
            .filter(|c| **c == SimCommand::IdleImmediate)
            .count();
        assert_eq!(wakes, wakes_needed, "{model}");
        assert!(board.clock().now_ms() < 1000 * wakes_needed as u64 + 1000, "{model}");
    }
}

#[test]
fn drive_that_never_spins_up_is_given_up_after_the_retry_budget() {
    let tag = PciTag::new(0, 12, 0);
    let mut board = SimBoard::new();
    board
        .attach(
            tag,
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive("DEAD").in_standby(u32::MAX)), None]),
        )
        .unwrap();
    let cfg = BringUpConfig::default();

    let controllers = boot(&mut board, &cfg);
    assert_eq!(controllers[0].channel(0).unwrap().state(), ChannelState::Absent);
    assert_eq!(
        board.channel(tag, 0).unwrap().drive().unwrap().wakes_seen(),
        cfg.pata_wake_retries
    );
}

#[test]
fn disabled_pata_channel_is_never_touched() {
    let tag = PciTag::new(0, 12, 0);
    let mut board = SimBoard::new();
    board
        .attach(
            tag,
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive("A")), Some(drive("B"))]),
        )
        .unwrap();
    let cfg = BringUpConfig {
        pata_disable_mask: 0b10,
        ..BringUpConfig::default()
    };

    let controllers = boot(&mut board, &cfg);
    assert_eq!(
        states(&controllers[0]),
        vec![ChannelState::Active, ChannelState::Absent]
    );
    assert!(board.channel(tag, 1).unwrap().commands().is_empty());
}

#[test]
fn empty_pata_channel_is_absent_without_waiting_for_spin_up() {
    let tag = PciTag::new(0, 12, 0);
    let mut board = SimBoard::new();
    board
        .attach(tag, SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive("A")), None]))
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    assert_eq!(
        states(&controllers[0]),
        vec![ChannelState::Active, ChannelState::Absent]
    );
    assert!(board.clock().now_ms() < 1000);
}

#[test]
fn only_one_controller_gets_the_compatibility_ports() {
    let mut board = SimBoard::new();
    board
        .attach(
            PciTag::new(0, 11, 0),
            SimFunction::pci_ide(0x1106, 0x0571, 0x8A, [Some(drive("LEGACY")), None]),
        )
        .unwrap();
    board
        .attach(
            PciTag::new(0, 13, 0),
            SimFunction::pci_ide(0x8086, 0x7111, 0x80, [None, None]),
        )
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    assert_eq!(controllers.len(), 1);
    assert_eq!(controllers[0].tag(), PciTag::new(0, 11, 0));
    assert!(controllers[0].is_present(0));
    // The chip fix-up switched both channels on.
    let cfg = board.function(PciTag::new(0, 11, 0)).unwrap().config();
    assert_eq!(cfg.byte(0x40) & 0x03, 0x03);
}

#[test]
fn mixed_mode_controller_uses_its_window_and_the_fixed_ports() {
    let tag = PciTag::new(0, 12, 0);
    let mut board = SimBoard::new();
    board
        .attach(
            tag,
            SimFunction::pci_ide(0x1283, 0x8211, 0x81, [Some(drive("NATIVE")), Some(drive("COMPAT"))]),
        )
        .unwrap();

    let controllers = boot(&mut board, &BringUpConfig::default());
    let ite = &controllers[0];
    assert_eq!(states(ite), vec![ChannelState::Active, ChannelState::Active]);

    let bar0 = board.read_config(tag, 0x10) & !0x3;
    assert_ne!(bar0, 0);
    assert_eq!(ite.channel(0).unwrap().registers().command_base(), pci_io_to_cpu(bar0));
    assert_eq!(ite.channel(1).unwrap().registers().command_base(), pci_io_to_cpu(0x170));
    assert!(board.channel(tag, 0).unwrap().commands().contains(&SimCommand::SoftReset));
    assert!(board.channel(tag, 1).unwrap().commands().contains(&SimCommand::SoftReset));
}

#[test]
fn chip_fixup_follows_window_resolution() {
    let tag = PciTag::new(0, 11, 0);
    let mut board = SimBoard::new();
    board
        .attach(tag, SimFunction::pci_ide(0x1106, 0x0571, 0x8A, [Some(drive("VIA")), None]))
        .unwrap();
    enumerate(&mut board, &mut ResourceWindows::new(PciWindowsConfig::default()));
    board.clear_config_accesses();

    let controllers = discover(&mut board, &BringUpConfig::default());
    assert_eq!(controllers.len(), 1);

    let log: Vec<SimConfigAccess> = board
        .config_accesses()
        .iter()
        .copied()
        .filter(|access| access.tag() == tag)
        .collect();
    let last_bar_read = log
        .iter()
        .rposition(|access| (0x10..=0x24).contains(&access.reg()))
        .expect("windows were read");
    let first_fixup = log
        .iter()
        .position(|access| access.reg() == 0x40)
        .expect("fix-up touched the enable register");
    assert!(last_bar_read < first_fixup, "{log:?}");
    assert!(log[first_fixup..]
        .iter()
        .any(|access| matches!(access, SimConfigAccess::Write { reg: 0x40, .. })));
}

#[test]
fn driverless_storage_functions_do_not_use_up_the_controller_limit() {
    let mut board = SimBoard::new();
    for slot in 1..=4 {
        board
            .attach(PciTag::new(0, slot, 0), SimFunction::new(0x1000, 0x0030, 0x01, 0x00, 0x00))
            .unwrap();
    }
    for slot in 10..=14 {
        board
            .attach(
                PciTag::new(0, slot, 0),
                SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [Some(drive("LATE")), None]),
            )
            .unwrap();
    }

    let controllers = boot(&mut board, &BringUpConfig::default());
    assert_eq!(controllers.len(), MAX_CONTROLLERS);
    let tags: Vec<PciTag> = controllers.iter().map(Controller::tag).collect();
    assert_eq!(tags, (10..=13).map(|slot| PciTag::new(0, slot, 0)).collect::<Vec<_>>());
    assert!(controllers.iter().all(|c| c.is_present(0)));
    assert!(board.channel(PciTag::new(0, 14, 0), 0).unwrap().commands().is_empty());
}
