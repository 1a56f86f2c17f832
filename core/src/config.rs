//! Resolved build configuration.
//!
//! The CLI (or whatever front end drives the engine) parses and validates
//! user input, then hands the engine one of these. Sizes are in bytes;
//! validation against sector-size constraints happens in
//! [`DiskGeometry::plan`](crate::geometry::DiskGeometry::plan).

/// Payload for one ESP insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertSource {
    /// File contents, written through a freshly allocated cluster chain.
    Bytes(Vec<u8>),
    /// Create an (empty) directory at the target path.
    Directory,
}

/// One path to create inside the FAT32 tree of the ESP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    /// Absolute, slash-delimited path, e.g. `/EFI/BOOT/BOOTX64.EFI`.
    pub path: String,
    pub source: InsertSource,
}

impl Insertion {
    pub fn file(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            source: InsertSource::Bytes(data),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: InsertSource::Directory,
        }
    }
}

/// Everything the engine needs to produce one image in one pass.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Logical sector size in bytes: 512, 1024, 2048 or 4096.
    pub lba_size: u64,
    /// EFI System Partition size in bytes.
    pub esp_size: u64,
    /// Raw data partition size in bytes.
    pub data_size: u64,
    /// Files and directories to create inside the ESP after formatting.
    pub esp_files: Vec<Insertion>,
    /// Raw payloads appended back to back into the data partition.
    pub data_files: Vec<Vec<u8>>,
    /// Whether the caller intends to append a VHD footer after the image.
    /// The engine does not write the footer; the flag travels with the
    /// config so front ends can make the decision in one place.
    pub vhd_footer: bool,
}

impl BuildConfig {
    pub fn new(lba_size: u64, esp_size: u64, data_size: u64) -> Self {
        Self {
            lba_size,
            esp_size,
            data_size,
            esp_files: Vec::new(),
            data_files: Vec::new(),
            vhd_footer: false,
        }
    }
}

impl Default for BuildConfig {
    /// 512-byte sectors, 33 MiB ESP, 1 MiB data partition: the smallest
    /// FAT32-valid image.
    fn default() -> Self {
        Self::new(512, 33 * 1024 * 1024, 1024 * 1024)
    }
}
