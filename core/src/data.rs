//! Raw data partition writer.
//!
//! No filesystem: payloads are appended back to back on sector boundaries
//! and located through the records this writer hands back. The cursor
//! only ever moves forward within one build.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::debug;

use crate::error::{BuildError, CapacityError};
use crate::geometry::{bytes_to_lbas, DiskGeometry};

/// Where one appended payload landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFileRecord {
    /// Absolute first sector of the payload.
    pub lba: u64,
    /// Sectors occupied (payload rounded up to whole sectors).
    pub sectors: u64,
    /// Exact payload length in bytes.
    pub len: u64,
}

/// Sequential appender over the data partition.
#[derive(Debug)]
pub struct DataPartitionWriter {
    partition_lba: u64,
    partition_lbas: u64,
    lba_size: u64,
    /// Next free sector, relative to the partition start.
    cursor: u64,
}

impl DataPartitionWriter {
    pub fn new(geometry: &DiskGeometry) -> Self {
        Self {
            partition_lba: geometry.data_lba,
            partition_lbas: geometry.data_lbas,
            lba_size: geometry.lba_size,
            cursor: 0,
        }
    }

    /// Sectors still unclaimed.
    pub fn remaining_lbas(&self) -> u64 {
        self.partition_lbas - self.cursor
    }

    /// Append one payload at the cursor.
    ///
    /// On overflow nothing is written and the cursor stays put; the
    /// caller decides whether that ends the build or just skips the file.
    pub fn append<B: BlockIo>(
        &mut self,
        block_io: &mut B,
        data: &[u8],
    ) -> Result<DataFileRecord, BuildError> {
        let sectors = bytes_to_lbas(data.len() as u64, self.lba_size);
        if sectors > self.remaining_lbas() {
            return Err(CapacityError::DataPartitionFull {
                requested: sectors,
                available: self.remaining_lbas(),
            }
            .into());
        }

        let lba = self.partition_lba + self.cursor;
        if sectors > 0 {
            let mut padded = vec![0u8; (sectors * self.lba_size) as usize];
            padded[..data.len()].copy_from_slice(data);
            block_io
                .write_blocks(Lba(lba), &padded)
                .map_err(BuildError::io)?;
        }

        self.cursor += sectors;
        debug!(
            "appended {} bytes at LBA {lba}, {} sectors left in data partition",
            data.len(),
            self.remaining_lbas()
        );

        Ok(DataFileRecord {
            lba,
            sectors,
            len: data.len() as u64,
        })
    }
}
