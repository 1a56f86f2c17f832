//! File payload writes.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::debug;

use super::context::Fat32Context;
use super::directory::append_entry;
use super::fat;
use super::types::DirEntry;
use crate::error::BuildError;

/// Write `data` as a new file named `name` inside `dir_cluster`.
///
/// Allocates a chain of `ceil(len / cluster_size)` clusters (one for an
/// empty file), fills them with the payload zero-padded to whole
/// clusters, then appends the directory entry. Payload first, entry
/// last: an aborted write leaves no name behind.
pub fn write_file_in_directory<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    dir_cluster: u32,
    name: &[u8; 11],
    data: &[u8],
) -> Result<(), BuildError> {
    let cluster_bytes = ctx.cluster_bytes();
    let clusters_needed = data.len().div_ceil(cluster_bytes).max(1) as u32;

    let first = fat::allocate_chain(block_io, ctx, clusters_needed)?;
    debug!(
        "writing {} bytes into {} clusters starting at {first}",
        data.len(),
        clusters_needed
    );

    let mut cluster_data = vec![0u8; cluster_bytes];
    for i in 0..clusters_needed {
        let chunk_start = i as usize * cluster_bytes;
        let chunk_end = (chunk_start + cluster_bytes).min(data.len());

        cluster_data.fill(0);
        if chunk_start < data.len() {
            cluster_data[..chunk_end - chunk_start].copy_from_slice(&data[chunk_start..chunk_end]);
        }

        block_io
            .write_blocks(Lba(ctx.cluster_to_lba(first + i)), &cluster_data)
            .map_err(BuildError::io)?;
    }

    append_entry(
        block_io,
        ctx,
        dir_cluster,
        &DirEntry::file(*name, first, data.len() as u32),
    )
}
