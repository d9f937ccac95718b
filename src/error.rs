use ppcboot_disk::DiskError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BootError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error("probe has not run")]
    NotProbed,
}
