//! Volume layout context.
//!
//! Every FAT32 operation after formatting works from a `Fat32Context`:
//! the handful of numbers needed to translate clusters to absolute LBAs
//! and find the FAT and FSInfo sectors. The context is derived from the
//! on-disk boot record, never cached across operations, so the image file
//! itself stays the single source of truth.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use super::boot_sector::BootRecord;
use crate::error::BuildError;

#[derive(Debug, Clone, Copy)]
pub struct Fat32Context {
    /// Absolute LBA of the partition's first sector.
    pub partition_lba: u64,
    /// Logical sector size in bytes.
    pub lba_size: u64,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub num_fats: u32,
    pub sectors_per_fat: u32,
    pub root_cluster: u32,
    /// FSInfo sector, relative to the partition start.
    pub fsinfo_sector: u32,
    pub total_sectors: u32,
}

impl Fat32Context {
    pub fn new(partition_lba: u64, lba_size: u64, record: &BootRecord) -> Self {
        Self {
            partition_lba,
            lba_size,
            sectors_per_cluster: u32::from(record.sectors_per_cluster),
            reserved_sectors: u32::from(record.reserved_sectors),
            num_fats: u32::from(record.num_fats),
            sectors_per_fat: record.sectors_per_fat,
            root_cluster: record.root_cluster,
            fsinfo_sector: u32::from(record.fsinfo_sector),
            total_sectors: record.total_sectors,
        }
    }

    /// Re-read the boot record of an already formatted partition.
    pub fn from_boot_sector<B: BlockIo>(
        block_io: &mut B,
        partition_lba: u64,
        lba_size: u64,
    ) -> Result<Self, BuildError> {
        let mut sector = vec![0u8; lba_size as usize];
        block_io
            .read_blocks(Lba(partition_lba), &mut sector)
            .map_err(BuildError::io)?;
        let record = BootRecord::decode(&sector)?;
        Ok(Self::new(partition_lba, lba_size, &record))
    }

    /// First sector of the first FAT copy, relative to the partition.
    pub fn fat_start_sector(&self) -> u32 {
        self.reserved_sectors
    }

    /// First sector of the data region, relative to the partition.
    pub fn data_start_sector(&self) -> u32 {
        self.reserved_sectors + self.num_fats * self.sectors_per_fat
    }

    /// Number of data clusters in the partition.
    pub fn cluster_count(&self) -> u32 {
        (self.total_sectors - self.data_start_sector()) / self.sectors_per_cluster
    }

    /// Highest valid cluster number.
    pub fn max_cluster(&self) -> u32 {
        self.cluster_count() + 1
    }

    /// Absolute LBA of the first sector of a cluster.
    pub fn cluster_to_lba(&self, cluster: u32) -> u64 {
        debug_assert!(cluster >= 2);
        self.partition_lba
            + u64::from(self.data_start_sector())
            + u64::from(cluster - 2) * u64::from(self.sectors_per_cluster)
    }

    /// Cluster size in bytes.
    pub fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * self.lba_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BootRecord {
        BootRecord {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            num_fats: 2,
            media: 0xF8,
            hidden_sectors: 2048,
            total_sectors: 67584,
            sectors_per_fat: 524,
            root_cluster: 2,
            fsinfo_sector: 1,
            backup_boot_sector: 6,
            volume_id: 0,
            volume_label: *b"EFI SYSTEM ",
        }
    }

    #[test]
    fn cluster_translation() {
        let ctx = Fat32Context::new(2048, 512, &record());
        assert_eq!(ctx.fat_start_sector(), 32);
        assert_eq!(ctx.data_start_sector(), 32 + 2 * 524);
        // Cluster 2 is the first data cluster.
        assert_eq!(ctx.cluster_to_lba(2), 2048 + 32 + 1048);
        assert_eq!(ctx.cluster_to_lba(5), 2048 + 32 + 1048 + 3);
        assert_eq!(ctx.cluster_bytes(), 512);
    }

    #[test]
    fn cluster_count_excludes_metadata() {
        let ctx = Fat32Context::new(2048, 512, &record());
        assert_eq!(ctx.cluster_count(), 67584 - 32 - 1048);
        assert_eq!(ctx.max_cluster(), ctx.cluster_count() + 1);
    }
}
