use ppcboot_platform::PciTag;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("disk image length {len} is not a multiple of 512 bytes")]
    UnalignedImage { len: usize },

    #[error("write of {len} bytes at offset {offset:#x} runs past the end of a {sectors}-sector disk")]
    PastEnd { offset: u64, len: usize, sectors: u64 },

    #[error("PCI function {tag} is already populated")]
    SlotTaken { tag: PciTag },
}

pub type Result<T> = std::result::Result<T, SimError>;
