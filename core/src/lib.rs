//! Bootable disk image construction engine.
//!
//! Produces a GPT-partitioned image with a FAT32 EFI System Partition and
//! a raw data partition, then inserts files into both. Everything is
//! written through the `gpt_disk_io::BlockIo` seam, so the same code runs
//! against an image file or an in-memory buffer.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                 builder (one-pass coordinator)             │
//! └──────────────────────────┬─────────────────────────────────┘
//!                            │
//!          ┌─────────────────┼─────────────────┐
//!          ▼                 ▼                 ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │  disk::mbr   │  │  fs::fat32   │  │    data      │
//! │  disk::gpt   │  │  (format +   │  │  (raw        │
//! │  (tables)    │  │   insert)    │  │   appends)   │
//! └──────────────┘  └──────────────┘  └──────────────┘
//!          │                 │                 │
//!          └─────────────────┼─────────────────┘
//!                            ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │         gpt_disk_io::BlockIo (file or slice backed)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Geometry is planned once per build and never mutated; after the
//! initial write pass the image itself is the authoritative state, and
//! insertions are self-contained read-modify-write passes over it.
//!
//! # Example
//!
//! ```no_run
//! use bootforge_core::{build_image, BuildConfig, FileBlockIo, Insertion};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = BuildConfig::default();
//! config.esp_files.push(Insertion::file(
//!     "/EFI/BOOT/BOOTX64.EFI",
//!     std::fs::read("BOOTX64.EFI")?,
//! ));
//!
//! let mut file = std::fs::OpenOptions::new()
//!     .read(true)
//!     .write(true)
//!     .create(true)
//!     .open("disk.img")?;
//! file.set_len(38 * 1024 * 1024)?;
//!
//! let mut block_io = FileBlockIo::new(&mut file, 512)?;
//! let report = build_image(&config, &mut block_io)?;
//! println!("image spans {} sectors", report.geometry.total_lbas);
//! # Ok(())
//! # }
//! ```

pub mod block_io;
pub mod builder;
pub mod checksum;
pub mod config;
pub mod data;
pub mod disk;
pub mod error;
pub mod fs;
pub mod geometry;
pub mod guid;

pub use block_io::FileBlockIo;
pub use builder::{build_image, insert_file, BuildReport, SkippedInsertion};
pub use config::{BuildConfig, InsertSource, Insertion};
pub use data::{DataFileRecord, DataPartitionWriter};
pub use error::{BuildError, BuildResult, CapacityError, ConfigError, FormatError};
pub use fs::fat32::Fat32Context;
pub use geometry::DiskGeometry;
