//! FAT32 volume builder for the EFI System Partition.
//!
//! Writes the boot record, FSInfo, their backups, both (identical) file
//! allocation tables, and the seeded `/EFI/BOOT` directory tree every
//! bootable ESP starts from.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::info;

use super::boot_sector::{sectors_per_fat, BootRecord, FsInfo};
use super::context::Fat32Context;
use super::directory::{append_entry, write_dot_entries};
use super::fat;
use super::types::{DirEntry, FAT_EOC, FAT_MEDIA_MARKER, FAT_RESERVED_EOC};
use crate::error::BuildError;
use crate::geometry::DiskGeometry;

/// Fixed format policy: one sector per cluster, 32 reserved sectors, two
/// FAT copies, root directory at cluster 2.
const SECTORS_PER_CLUSTER: u32 = 1;
const RESERVED_SECTORS: u32 = 32;
const NUM_FATS: u32 = 2;
const ROOT_CLUSTER: u32 = 2;
const FSINFO_SECTOR: u16 = 1;
const BACKUP_BOOT_SECTOR: u16 = 6;

/// Clusters pre-allocated by the seeded directory tree.
const EFI_CLUSTER: u32 = 3;
const BOOT_CLUSTER: u32 = 4;
const SEEDED_CLUSTERS: u32 = 3;

pub const VOLUME_LABEL: [u8; 11] = *b"EFI SYSTEM ";

/// Format the ESP region described by `geometry` and return the layout
/// context for subsequent insertions.
pub fn format_esp<B: BlockIo>(
    block_io: &mut B,
    geometry: &DiskGeometry,
) -> Result<Fat32Context, BuildError> {
    let total_sectors = geometry.esp_lbas as u32;
    let spf = sectors_per_fat(total_sectors, RESERVED_SECTORS, SECTORS_PER_CLUSTER, NUM_FATS);

    let record = BootRecord {
        bytes_per_sector: geometry.lba_size as u16,
        sectors_per_cluster: SECTORS_PER_CLUSTER as u8,
        reserved_sectors: RESERVED_SECTORS as u16,
        num_fats: NUM_FATS as u8,
        media: 0xF8,
        hidden_sectors: geometry.esp_lba as u32,
        total_sectors,
        sectors_per_fat: spf,
        root_cluster: ROOT_CLUSTER,
        fsinfo_sector: FSINFO_SECTOR,
        backup_boot_sector: BACKUP_BOOT_SECTOR,
        volume_id: rand::random(),
        volume_label: VOLUME_LABEL,
    };
    let ctx = Fat32Context::new(geometry.esp_lba, geometry.lba_size, &record);

    let mut sector = vec![0u8; geometry.lba_size as usize];

    // Boot record + backup copy
    record.encode(&mut sector);
    write(block_io, geometry.esp_lba, &sector)?;
    write(block_io, geometry.esp_lba + u64::from(BACKUP_BOOT_SECTOR), &sector)?;

    // FSInfo + backup: allocation starts right past the seeded tree
    let fsinfo = FsInfo {
        free_count: ctx.cluster_count() - SEEDED_CLUSTERS,
        next_free: BOOT_CLUSTER + 1,
    };
    fsinfo.encode(&mut sector);
    write(block_io, geometry.esp_lba + u64::from(FSINFO_SECTOR), &sector)?;
    write(block_io, geometry.esp_lba + u64::from(BACKUP_BOOT_SECTOR) + 1, &sector)?;

    // Clear both FAT regions so the allocator never trips over stale data
    // when the sink is a reused file.
    sector.fill(0);
    let fat_region_start = geometry.esp_lba + u64::from(ctx.fat_start_sector());
    for s in 0..u64::from(NUM_FATS * spf) {
        write(block_io, fat_region_start + s, &sector)?;
    }

    // Reserved entries + the seeded directory chain, in both copies
    fat::write_entry(block_io, &ctx, 0, FAT_MEDIA_MARKER)?;
    fat::write_entry(block_io, &ctx, 1, FAT_RESERVED_EOC)?;
    fat::write_entry(block_io, &ctx, ROOT_CLUSTER, FAT_EOC)?;
    fat::write_entry(block_io, &ctx, EFI_CLUSTER, FAT_EOC)?;
    fat::write_entry(block_io, &ctx, BOOT_CLUSTER, FAT_EOC)?;

    // Root directory: a single `EFI` entry (the root has no dot entries)
    let mut root = vec![0u8; ctx.cluster_bytes()];
    DirEntry::directory(*b"EFI        ", EFI_CLUSTER).encode(&mut root[0..32]);
    block_io
        .write_blocks(Lba(ctx.cluster_to_lba(ROOT_CLUSTER)), &root)
        .map_err(BuildError::io)?;

    // /EFI: `.`, `..`, `BOOT`; /EFI/BOOT: `.`, `..`
    write_dot_entries(block_io, &ctx, EFI_CLUSTER, ROOT_CLUSTER)?;
    append_entry(
        block_io,
        &ctx,
        EFI_CLUSTER,
        &DirEntry::directory(*b"BOOT       ", BOOT_CLUSTER),
    )?;
    write_dot_entries(block_io, &ctx, BOOT_CLUSTER, EFI_CLUSTER)?;

    info!(
        "formatted ESP at LBA {}: {total_sectors} sectors, {spf} sectors per FAT, {} clusters",
        geometry.esp_lba,
        ctx.cluster_count()
    );
    Ok(ctx)
}

fn write<B: BlockIo>(block_io: &mut B, lba: u64, sector: &[u8]) -> Result<(), BuildError> {
    block_io
        .write_blocks(Lba(lba), sector)
        .map_err(BuildError::io)
}
