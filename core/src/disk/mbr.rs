//! Protective legacy boot record.
//!
//! Sector 0 carries a classic MBR whose single partition slot spans the
//! whole disk with type 0xEE, telling pre-GPT tools the disk is taken.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use crate::error::BuildError;
use crate::geometry::DiskGeometry;

/// Byte offset of partition slot 0 inside the boot record.
const PARTITION_TABLE_OFFSET: usize = 446;

/// Protective GPT partition type.
pub const OS_TYPE_PROTECTIVE: u8 = 0xEE;

/// Build the protective record, zero-padded to a full sector.
///
/// The MBR layout is defined in terms of a 512-byte block, so the
/// partition table and the 0xAA55 signature sit at their classic offsets
/// regardless of the configured sector size.
pub fn encode_protective_mbr(geometry: &DiskGeometry) -> Vec<u8> {
    let mut sector = vec![0u8; geometry.lba_size as usize];

    // Size in sectors saturates when the true count does not fit 32 bits.
    let size_lba = u32::try_from(geometry.total_lbas - 1).unwrap_or(u32::MAX);

    let p = PARTITION_TABLE_OFFSET;
    sector[p] = 0x00; // status: non-bootable
    sector[p + 1..p + 4].copy_from_slice(&[0x00, 0x02, 0x00]); // starting CHS
    sector[p + 4] = OS_TYPE_PROTECTIVE;
    sector[p + 5..p + 8].copy_from_slice(&[0xFF, 0xFF, 0xFF]); // ending CHS
    sector[p + 8..p + 12].copy_from_slice(&1u32.to_le_bytes()); // starting LBA
    sector[p + 12..p + 16].copy_from_slice(&size_lba.to_le_bytes());

    // Boot signature
    sector[510] = 0x55;
    sector[511] = 0xAA;

    sector
}

/// Write the protective record at sector 0.
pub fn write_protective_mbr<B: BlockIo>(
    block_io: &mut B,
    geometry: &DiskGeometry,
) -> Result<(), BuildError> {
    let sector = encode_protective_mbr(geometry);
    block_io
        .write_blocks(Lba(0), &sector)
        .map_err(BuildError::io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    #[test]
    fn protective_slot_spans_the_disk() {
        let geometry = DiskGeometry::plan(&BuildConfig::default()).unwrap();
        let sector = encode_protective_mbr(&geometry);

        assert_eq!(sector.len(), 512);
        assert_eq!(sector[446], 0x00);
        assert_eq!(sector[450], 0xEE);
        assert_eq!(
            u32::from_le_bytes(sector[454..458].try_into().unwrap()),
            1,
            "protective partition starts at LBA 1"
        );
        assert_eq!(
            u64::from(u32::from_le_bytes(sector[458..462].try_into().unwrap())),
            geometry.total_lbas - 1
        );
        assert_eq!(&sector[510..512], &[0x55, 0xAA]);
        // Slots 1-3 stay zero.
        assert!(sector[462..510].iter().all(|&b| b == 0));
    }

    #[test]
    fn size_saturates_past_32_bits() {
        let mut geometry = DiskGeometry::plan(&BuildConfig::default()).unwrap();
        geometry.total_lbas = 0x2_0000_0000;
        let sector = encode_protective_mbr(&geometry);
        assert_eq!(
            u32::from_le_bytes(sector[458..462].try_into().unwrap()),
            0xFFFF_FFFF
        );
    }
}
