use ppcboot_pci::regs::PCI_CLASS_MASS_STORAGE;
use ppcboot_pci::{
    decompose_tag, enumerate, find_class, find_device, make_tag, PciWindowsConfig,
    ResourceWindows,
};
use ppcboot_sim::{SimBoard, SimFunction};

fn board() -> SimBoard {
    let mut board = SimBoard::new();
    board
        .attach(make_tag(0, 3, 0), SimFunction::bridge(0x3388, 0x0021))
        .unwrap();
    board
        .attach(
            make_tag(1, 2, 0),
            SimFunction::sii_sata(0x3512, vec![None, None]),
        )
        .unwrap();
    board
        .attach(
            make_tag(0, 13, 0),
            SimFunction::pci_ide(0x1283, 0x8211, 0x8F, [None, None]),
        )
        .unwrap();
    board
        .attach(
            make_tag(0, 15, 0),
            SimFunction::new(0x10EC, 0x8169, 0x02, 0x00, 0x00),
        )
        .unwrap();
    board
}

#[test]
fn device_behind_a_bridge_is_found_after_enumeration() {
    let mut board = board();
    assert_eq!(find_device(&mut board, 0x1095, 0x3512), None);

    enumerate(
        &mut board,
        &mut ResourceWindows::new(PciWindowsConfig::default()),
    );
    let tag = find_device(&mut board, 0x1095, 0x3512).unwrap();
    assert_eq!(decompose_tag(tag), (1, 2, 0));
    assert_eq!(find_device(&mut board, 0x1095, 0x3114), None);
}

#[test]
fn class_search_descends_through_bridges_depth_first_and_honours_the_limit() {
    let mut board = board();
    enumerate(
        &mut board,
        &mut ResourceWindows::new(PciWindowsConfig::default()),
    );

    let all = find_class(&mut board, PCI_CLASS_MASS_STORAGE, 8);
    assert_eq!(all, vec![make_tag(1, 2, 0), make_tag(0, 13, 0)]);

    let first = find_class(&mut board, PCI_CLASS_MASS_STORAGE, 1);
    assert_eq!(first, vec![make_tag(1, 2, 0)]);
    assert!(find_class(&mut board, 0x0C, 4).is_empty());
}
