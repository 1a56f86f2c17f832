//! Directory scanning and creation.
//!
//! Directories are linear arrays of 32-byte entries spread over a cluster
//! chain; a zero first name byte terminates the in-use portion. Scans walk
//! the whole chain, and appends check bounds instead of running past the
//! allocated clusters.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::debug;

use super::context::Fat32Context;
use super::fat;
use super::filename::short_name;
use super::types::{is_end_of_chain, DirEntry, DIR_ENTRY_SIZE, ENTRY_DELETED};
use crate::error::{BuildError, CapacityError, FormatError};

/// Find an entry by its 11-byte short name, walking the directory's full
/// cluster chain. Stops at the end-of-directory terminator.
pub fn find_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
    name: &[u8; 11],
) -> Result<Option<DirEntry>, BuildError> {
    let mut sector_data = vec![0u8; ctx.lba_size as usize];
    let mut cluster = dir_cluster;

    loop {
        let first_lba = ctx.cluster_to_lba(cluster);
        for sec_offset in 0..u64::from(ctx.sectors_per_cluster) {
            block_io
                .read_blocks(Lba(first_lba + sec_offset), &mut sector_data)
                .map_err(BuildError::io)?;

            for slot in sector_data.chunks_exact(DIR_ENTRY_SIZE) {
                if slot[0] == 0 {
                    return Ok(None); // end of directory
                }
                if slot[0] == ENTRY_DELETED {
                    continue;
                }
                if &slot[0..11] == name {
                    return Ok(Some(DirEntry::decode(slot)));
                }
            }
        }

        let next = fat::read_entry(block_io, ctx, cluster)?;
        if is_end_of_chain(next) {
            return Ok(None);
        }
        cluster = next;
    }
}

/// Append an entry at the first free slot of the directory's chain.
///
/// A full directory is a hard error; the chain is never extended here, so
/// the caller gets `DirectoryFull` instead of entries written past the
/// allocated region.
pub fn append_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
    entry: &DirEntry,
) -> Result<(), BuildError> {
    let mut sector_data = vec![0u8; ctx.lba_size as usize];
    let mut cluster = dir_cluster;

    loop {
        let first_lba = ctx.cluster_to_lba(cluster);
        for sec_offset in 0..u64::from(ctx.sectors_per_cluster) {
            let lba = Lba(first_lba + sec_offset);
            block_io
                .read_blocks(lba, &mut sector_data)
                .map_err(BuildError::io)?;

            for offset in (0..sector_data.len()).step_by(DIR_ENTRY_SIZE) {
                let lead = sector_data[offset];
                if lead == 0 || lead == ENTRY_DELETED {
                    entry.encode(&mut sector_data[offset..offset + DIR_ENTRY_SIZE]);
                    block_io
                        .write_blocks(lba, &sector_data)
                        .map_err(BuildError::io)?;
                    return Ok(());
                }
            }
        }

        let next = fat::read_entry(block_io, ctx, cluster)?;
        if is_end_of_chain(next) {
            let name = String::from_utf8_lossy(&entry.name).trim_end().to_string();
            return Err(CapacityError::DirectoryFull(name).into());
        }
        cluster = next;
    }
}

/// Write the `.` and `..` entries of a freshly allocated directory
/// cluster, zeroing the rest of the cluster.
pub fn write_dot_entries<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    cluster: u32,
    parent_cluster: u32,
) -> Result<(), BuildError> {
    let mut cluster_data = vec![0u8; ctx.cluster_bytes()];
    DirEntry::directory(*b".          ", cluster).encode(&mut cluster_data[0..DIR_ENTRY_SIZE]);
    DirEntry::directory(*b"..         ", parent_cluster)
        .encode(&mut cluster_data[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE]);

    block_io
        .write_blocks(Lba(ctx.cluster_to_lba(cluster)), &cluster_data)
        .map_err(BuildError::io)
}

/// Create a directory inside `parent_cluster` and return its cluster.
pub fn create_directory_in_parent<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    parent_cluster: u32,
    name: &[u8; 11],
) -> Result<u32, BuildError> {
    let cluster = fat::allocate_chain(block_io, ctx, 1)?;
    write_dot_entries(block_io, ctx, cluster, parent_cluster)?;
    append_entry(block_io, ctx, parent_cluster, &DirEntry::directory(*name, cluster))?;
    debug!("created directory cluster {cluster} under {parent_cluster}");
    Ok(cluster)
}

/// Descend into `segment` under `parent_cluster`, creating the directory
/// if it does not exist yet.
pub fn ensure_directory<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    parent_cluster: u32,
    segment: &str,
) -> Result<u32, BuildError> {
    let name = short_name(segment);
    match find_entry(block_io, ctx, parent_cluster, &name)? {
        Some(entry) if entry.is_directory() => Ok(entry.first_cluster),
        Some(_) => Err(FormatError::NotADirectory(segment.to_string()).into()),
        None => create_directory_in_parent(block_io, ctx, parent_cluster, &name),
    }
}
