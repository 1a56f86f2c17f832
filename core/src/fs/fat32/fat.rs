//! File allocation table access and the cluster allocator.
//!
//! Entries are patched read-modify-write, always into both FAT copies, so
//! the two tables stay byte-identical. Allocation scans for the first
//! contiguous run of free entries: a plain linear walk from cluster 2,
//! with no free list and no reclamation.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use super::boot_sector::{FsInfo, FSINFO_UNKNOWN};
use super::context::Fat32Context;
use super::types::{FAT_ENTRY_MASK, FAT_EOC, FIRST_DATA_CLUSTER};
use crate::error::{BuildError, CapacityError};

/// Read one FAT entry (masked to its significant 28 bits) from the first
/// FAT copy.
pub fn read_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    cluster: u32,
) -> Result<u32, BuildError> {
    let entries_per_sector = (ctx.lba_size / 4) as u32;
    let sector = ctx.fat_start_sector() + cluster / entries_per_sector;
    let offset = ((cluster % entries_per_sector) * 4) as usize;

    let mut buf = vec![0u8; ctx.lba_size as usize];
    block_io
        .read_blocks(Lba(ctx.partition_lba + u64::from(sector)), &mut buf)
        .map_err(BuildError::io)?;

    Ok(u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) & FAT_ENTRY_MASK)
}

/// Write one FAT entry into every FAT copy.
pub fn write_entry<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    cluster: u32,
    value: u32,
) -> Result<(), BuildError> {
    let entries_per_sector = (ctx.lba_size / 4) as u32;
    let relative_sector = cluster / entries_per_sector;
    let offset = ((cluster % entries_per_sector) * 4) as usize;

    let mut buf = vec![0u8; ctx.lba_size as usize];
    for copy in 0..ctx.num_fats {
        let sector = ctx.partition_lba
            + u64::from(ctx.fat_start_sector() + copy * ctx.sectors_per_fat + relative_sector);
        block_io
            .read_blocks(Lba(sector), &mut buf)
            .map_err(BuildError::io)?;
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        block_io
            .write_blocks(Lba(sector), &buf)
            .map_err(BuildError::io)?;
    }
    Ok(())
}

/// First cluster of the first run of `needed` contiguous free entries.
fn find_free_run<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    needed: u32,
) -> Result<u32, BuildError> {
    let entries_per_sector = (ctx.lba_size / 4) as u32;
    let mut buf = vec![0u8; ctx.lba_size as usize];
    let mut loaded_sector = u32::MAX;

    let mut run_start = 0u32;
    let mut run_len = 0u32;
    for cluster in FIRST_DATA_CLUSTER..=ctx.max_cluster() {
        let sector = ctx.fat_start_sector() + cluster / entries_per_sector;
        if sector != loaded_sector {
            block_io
                .read_blocks(Lba(ctx.partition_lba + u64::from(sector)), &mut buf)
                .map_err(BuildError::io)?;
            loaded_sector = sector;
        }

        let offset = ((cluster % entries_per_sector) * 4) as usize;
        let value = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) & FAT_ENTRY_MASK;
        if value == 0 {
            if run_len == 0 {
                run_start = cluster;
            }
            run_len += 1;
            if run_len == needed {
                return Ok(run_start);
            }
        } else {
            run_len = 0;
        }
    }

    Err(CapacityError::FatExhausted { needed }.into())
}

/// Allocate a chain of `count` clusters: find a contiguous free run, link
/// `c -> c+1 -> ... -> end-of-chain` in both FAT copies, and move the
/// FSInfo allocation hint past the new chain. Returns the first cluster.
pub fn allocate_chain<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    count: u32,
) -> Result<u32, BuildError> {
    debug_assert!(count >= 1);
    let first = find_free_run(block_io, ctx, count)?;

    for i in 0..count - 1 {
        write_entry(block_io, ctx, first + i, first + i + 1)?;
    }
    write_entry(block_io, ctx, first + count - 1, FAT_EOC)?;

    update_fsinfo(block_io, ctx, first + count, count)?;
    Ok(first)
}

/// Refresh the FSInfo sector after an allocation: bump the next-free hint
/// and, when it is being tracked, drop the free count.
fn update_fsinfo<B: BlockIo>(
    block_io: &mut B,
    ctx: &Fat32Context,
    next_free: u32,
    allocated: u32,
) -> Result<(), BuildError> {
    let lba = Lba(ctx.partition_lba + u64::from(ctx.fsinfo_sector));
    let mut sector = vec![0u8; ctx.lba_size as usize];
    block_io
        .read_blocks(lba, &mut sector)
        .map_err(BuildError::io)?;

    let mut info = FsInfo::decode(&sector);
    info.next_free = next_free;
    if info.free_count != FSINFO_UNKNOWN {
        info.free_count = info.free_count.saturating_sub(allocated);
    }
    info.encode(&mut sector);

    block_io.write_blocks(lba, &sector).map_err(BuildError::io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpt_disk_io::BlockIoAdapter;
    use gpt_disk_types::BlockSize;

    // Tiny hand-built volume: 1 boot sector, 1 FSInfo sector, two 1-sector
    // FATs, 16 data clusters of one 512-byte sector each.
    fn test_ctx() -> Fat32Context {
        Fat32Context {
            partition_lba: 0,
            lba_size: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 2,
            num_fats: 2,
            sectors_per_fat: 1,
            root_cluster: 2,
            fsinfo_sector: 1,
            total_sectors: 20,
        }
    }

    fn test_volume() -> Vec<u8> {
        let mut image = vec![0u8; 20 * 512];
        FsInfo {
            free_count: 13,
            next_free: 5,
        }
        .encode(&mut image[512..1024]);
        // Entries 0..=4 used, the rest free.
        for (i, value) in [0x0FFF_FFF8u32, 0xFFFF_FFFF, FAT_EOC, FAT_EOC, FAT_EOC]
            .iter()
            .enumerate()
        {
            let offset = 2 * 512 + i * 4;
            image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            let offset = 3 * 512 + i * 4;
            image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        image
    }

    #[test]
    fn allocates_first_free_run_and_links_chain() {
        let ctx = test_ctx();
        let mut image = test_volume();
        let mut block_io = BlockIoAdapter::new(&mut image[..], BlockSize::new(512).unwrap());

        let first = allocate_chain(&mut block_io, &ctx, 3).unwrap();
        assert_eq!(first, 5);
        assert_eq!(read_entry(&mut block_io, &ctx, 5).unwrap(), 6);
        assert_eq!(read_entry(&mut block_io, &ctx, 6).unwrap(), 7);
        assert_eq!(read_entry(&mut block_io, &ctx, 7).unwrap(), FAT_EOC);

        drop(block_io);
        // Both FAT copies carry the chain.
        assert_eq!(&image[2 * 512 + 5 * 4..2 * 512 + 8 * 4], &image[3 * 512 + 5 * 4..3 * 512 + 8 * 4]);
        // FSInfo hint moved past the chain, free count dropped.
        let info = FsInfo::decode(&image[512..1024]);
        assert_eq!(info.next_free, 8);
        assert_eq!(info.free_count, 10);
    }

    #[test]
    fn skips_used_entries_when_hunting_a_run() {
        let ctx = test_ctx();
        let mut image = test_volume();
        // Occupy cluster 6 so the first 2-cluster run starts at 7.
        for fat in [2 * 512, 3 * 512] {
            image[fat + 6 * 4..fat + 7 * 4].copy_from_slice(&FAT_EOC.to_le_bytes());
        }
        let mut block_io = BlockIoAdapter::new(&mut image[..], BlockSize::new(512).unwrap());

        let first = allocate_chain(&mut block_io, &ctx, 2).unwrap();
        assert_eq!(first, 7);
    }

    #[test]
    fn exhaustion_is_reported() {
        let ctx = test_ctx();
        let mut image = test_volume();
        let mut block_io = BlockIoAdapter::new(&mut image[..], BlockSize::new(512).unwrap());

        // 13 clusters are free in total; no run of 14 exists.
        let err = allocate_chain(&mut block_io, &ctx, 14).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Capacity(CapacityError::FatExhausted { needed: 14 })
        ));
    }
}
