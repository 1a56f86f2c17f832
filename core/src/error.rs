//! Error taxonomy for the image builder.
//!
//! Four categories with different blast radii: configuration errors are
//! rejected before any byte is written, I/O errors abort the whole build,
//! path/name errors abort only the current insertion, and capacity errors
//! report exhausted space so the caller can decide what to drop.

use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Rejected configuration. Nothing has been written when one of these is
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported sector size {0} (expected 512, 1024, 2048 or 4096)")]
    UnsupportedSectorSize(u64),

    #[error("ESP size {got} is below the FAT32 minimum of {min} bytes for {lba_size}-byte sectors")]
    EspTooSmall { got: u64, min: u64, lba_size: u64 },

    #[error("data partition needs at least one {lba_size}-byte sector")]
    DataTooSmall { lba_size: u64 },
}

/// Malformed insertion path or name. Aborts the current insertion only;
/// the image stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("path {0:?} is not absolute (must start with '/')")]
    NotAbsolute(String),

    #[error("path {0:?} contains an empty segment")]
    EmptySegment(String),

    #[error("{0:?} exists but is not a directory")]
    NotADirectory(String),

    #[error("{0:?} already exists")]
    AlreadyExists(String),

    #[error("no valid FAT32 boot record at the expected sector")]
    InvalidBootRecord,
}

/// Out of space somewhere in the image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("no run of {needed} contiguous free clusters left in the FAT")]
    FatExhausted { needed: u32 },

    #[error("directory {0:?} has no free entry slot")]
    DirectoryFull(String),

    #[error("data partition full: {requested} sectors requested, {available} available")]
    DataPartitionFull { requested: u64, available: u64 },
}

/// Top-level error returned by every build and insertion operation.
///
/// I/O failures carry the rendered error of whatever [`BlockIo`]
/// implementation was in use; there is no retry and no partial-write
/// recovery anywhere in the engine.
///
/// [`BlockIo`]: gpt_disk_io::BlockIo
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o failure: {0}")]
    Io(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

impl BuildError {
    /// Wrap a block-device error. `BlockIo` error types are only required
    /// to be displayable, so the message is captured eagerly.
    pub(crate) fn io(err: impl core::fmt::Display) -> Self {
        BuildError::Io(err.to_string())
    }
}
