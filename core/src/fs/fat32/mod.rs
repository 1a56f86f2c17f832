//! FAT32 volume construction and tree insertion.
//!
//! `format_esp` writes a fresh volume; `insert` walks a slash-delimited
//! absolute path, creates missing intermediate directories, and writes the
//! final segment as a file or directory. Every insertion is a
//! read-modify-write pass over the image itself - there is no in-memory
//! filesystem model to get out of sync.

pub mod boot_sector;
pub mod context;
pub mod directory;
pub mod fat;
pub mod file_ops;
pub mod filename;
pub mod format;
pub mod types;

pub use context::Fat32Context;
pub use format::format_esp;

use gpt_disk_io::BlockIo;

use crate::config::InsertSource;
use crate::error::{BuildError, FormatError};

/// Insert a file or directory at `path`, creating intermediate
/// directories as needed. The final segment must not exist yet.
pub fn insert<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    path: &str,
    source: &InsertSource,
) -> Result<(), BuildError> {
    let mut segments = filename::path_segments(path)?.peekable();

    let mut current_cluster = ctx.root_cluster;
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            current_cluster = directory::ensure_directory(block_io, ctx, current_cluster, segment)?;
            continue;
        }

        // Final segment. Overwrite is deliberately unsupported: the
        // engine has no chain reclamation, so redefining a name would
        // leak its clusters.
        let name = filename::short_name(segment);
        if directory::find_entry(block_io, ctx, current_cluster, &name)?.is_some() {
            return Err(FormatError::AlreadyExists(path.to_string()).into());
        }

        match source {
            InsertSource::Bytes(data) => {
                file_ops::write_file_in_directory(block_io, ctx, current_cluster, &name, data)?;
            }
            InsertSource::Directory => {
                directory::create_directory_in_parent(block_io, ctx, current_cluster, &name)?;
            }
        }
    }

    Ok(())
}
