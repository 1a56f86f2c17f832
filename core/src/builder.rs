//! One-pass image construction.
//!
//! Coordinates the fixed write order the on-disk structures require:
//! geometry is planned once, the protective MBR and the mirrored GPT land
//! first, the FAT32 volume second, and only then do insertions run -
//! every later step computes absolute sectors from structures written
//! earlier.

use gpt_disk_io::BlockIo;
use log::{info, warn};

use crate::config::{BuildConfig, InsertSource};
use crate::data::{DataFileRecord, DataPartitionWriter};
use crate::disk::{gpt, mbr};
use crate::error::BuildError;
use crate::fs::fat32::{self, Fat32Context};
use crate::geometry::DiskGeometry;
use crate::guid;

/// An insertion the build dropped instead of aborting on.
#[derive(Debug, Clone)]
pub struct SkippedInsertion {
    /// ESP path or data-file index.
    pub target: String,
    pub reason: String,
}

/// What the caller gets back on success: the final layout (for summaries
/// or a trailing VHD footer) and where every data payload landed.
#[derive(Debug)]
pub struct BuildReport {
    pub geometry: DiskGeometry,
    pub data_files: Vec<DataFileRecord>,
    /// Insertions dropped by policy (bad path, no space). I/O failures
    /// are never dropped; they abort the build.
    pub skipped: Vec<SkippedInsertion>,
}

/// Produce one image from one configuration in one pass.
///
/// The sink must cover `geometry.total_lbas` sectors and read back zeros
/// where nothing has been written (a fresh `set_len` file or a zeroed
/// buffer both qualify).
pub fn build_image<B: BlockIo>(
    config: &BuildConfig,
    block_io: &mut B,
) -> Result<BuildReport, BuildError> {
    let geometry = DiskGeometry::plan(config)?;
    info!(
        "building image: {} sectors of {} bytes",
        geometry.total_lbas, geometry.lba_size
    );

    mbr::write_protective_mbr(block_io, &geometry)?;

    let partitions = [
        gpt::esp_partition(&geometry),
        gpt::basic_data_partition(&geometry),
    ];
    gpt::write_partition_tables(block_io, &geometry, guid::new_v4(), &partitions)?;

    let ctx = fat32::format_esp(block_io, &geometry)?;

    let mut skipped = Vec::new();
    for insertion in &config.esp_files {
        match fat32::insert(block_io, &ctx, &insertion.path, &insertion.source) {
            Ok(()) => {}
            Err(err @ (BuildError::Format(_) | BuildError::Capacity(_))) => {
                warn!("skipping ESP insertion {}: {err}", insertion.path);
                skipped.push(SkippedInsertion {
                    target: insertion.path.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let mut data_writer = DataPartitionWriter::new(&geometry);
    let mut data_files = Vec::new();
    for (index, payload) in config.data_files.iter().enumerate() {
        match data_writer.append(block_io, payload) {
            Ok(record) => data_files.push(record),
            Err(err @ BuildError::Capacity(_)) => {
                // Policy: a payload that does not fit is reported and the
                // build keeps going with whatever remains.
                warn!("data file #{index} does not fit: {err}");
                skipped.push(SkippedInsertion {
                    target: format!("data file #{index}"),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    block_io.flush().map_err(BuildError::io)?;
    Ok(BuildReport {
        geometry,
        data_files,
        skipped,
    })
}

/// Insert one path into the ESP of an already built image.
///
/// Re-reads the volume layout from the boot record, so this works on any
/// image this engine produced earlier, without carrying state between
/// processes.
pub fn insert_file<B: BlockIo>(
    block_io: &mut B,
    geometry: &DiskGeometry,
    path: &str,
    source: &InsertSource,
) -> Result<(), BuildError> {
    let ctx = Fat32Context::from_boot_sector(block_io, geometry.esp_lba, geometry.lba_size)?;
    fat32::insert(block_io, &ctx, path, source)?;
    block_io.flush().map_err(BuildError::io)
}
