//! FAT32 volume boot record and FSInfo sector codecs.
//!
//! Fixed-offset encode/decode over sector-sized buffers. The BPB layout
//! is the classic one; the 0xAA55 signature lands in the final two bytes
//! of the (possibly larger than 512 byte) sector.

use crate::error::{BuildError, FormatError};

/// Lead/struct/trail signatures of the FSInfo sector.
pub const FSINFO_LEAD_SIG: u32 = 0x4161_5252;
pub const FSINFO_STRUC_SIG: u32 = 0x6141_7272;
pub const FSINFO_TRAIL_SIG: u32 = 0xAA55_0000;

/// "Free count unknown" marker.
pub const FSINFO_UNKNOWN: u32 = 0xFFFF_FFFF;

/// The BPB fields this engine reads and writes. Fixed policy fields
/// (sectors per cluster 1, reserved 32, two FATs, root cluster 2) are
/// still carried explicitly so the decode side can trust what is on disk
/// rather than what the builder would have written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub media: u8,
    pub hidden_sectors: u32,
    pub total_sectors: u32,
    pub sectors_per_fat: u32,
    pub root_cluster: u32,
    pub fsinfo_sector: u16,
    pub backup_boot_sector: u16,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
}

impl BootRecord {
    /// Encode into a full sector buffer.
    pub fn encode(&self, sector: &mut [u8]) {
        sector.fill(0);

        // Jump instruction + OEM name
        sector[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        sector[3..11].copy_from_slice(b"BOOTFRGE");

        // BPB (BIOS Parameter Block)
        sector[11..13].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        sector[13] = self.sectors_per_cluster;
        sector[14..16].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        sector[16] = self.num_fats;
        // 17..19 root entries, 19..21 total sectors 16: zero for FAT32
        sector[21] = self.media;
        // 22..24 FAT size 16: zero for FAT32
        sector[24..26].copy_from_slice(&63u16.to_le_bytes()); // sectors per track
        sector[26..28].copy_from_slice(&255u16.to_le_bytes()); // number of heads
        sector[28..32].copy_from_slice(&self.hidden_sectors.to_le_bytes());
        sector[32..36].copy_from_slice(&self.total_sectors.to_le_bytes());

        // FAT32 extension
        sector[36..40].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        // 40..42 ext flags, 42..44 FS version: zero
        sector[44..48].copy_from_slice(&self.root_cluster.to_le_bytes());
        sector[48..50].copy_from_slice(&self.fsinfo_sector.to_le_bytes());
        sector[50..52].copy_from_slice(&self.backup_boot_sector.to_le_bytes());
        // 52..64 reserved
        sector[64] = 0x80; // drive number
        sector[66] = 0x29; // extended boot signature
        sector[67..71].copy_from_slice(&self.volume_id.to_le_bytes());
        sector[71..82].copy_from_slice(&self.volume_label);
        sector[82..90].copy_from_slice(b"FAT32   ");

        let end = sector.len();
        sector[end - 2] = 0x55;
        sector[end - 1] = 0xAA;
    }

    /// Decode a previously written boot record, validating the signature.
    pub fn decode(sector: &[u8]) -> Result<Self, BuildError> {
        let end = sector.len();
        if sector[end - 2] != 0x55 || sector[end - 1] != 0xAA {
            return Err(FormatError::InvalidBootRecord.into());
        }

        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[71..82]);

        Ok(Self {
            bytes_per_sector: u16::from_le_bytes([sector[11], sector[12]]),
            sectors_per_cluster: sector[13],
            reserved_sectors: u16::from_le_bytes([sector[14], sector[15]]),
            num_fats: sector[16],
            media: sector[21],
            hidden_sectors: u32::from_le_bytes(sector[28..32].try_into().unwrap()),
            total_sectors: u32::from_le_bytes(sector[32..36].try_into().unwrap()),
            sectors_per_fat: u32::from_le_bytes(sector[36..40].try_into().unwrap()),
            root_cluster: u32::from_le_bytes(sector[44..48].try_into().unwrap()),
            fsinfo_sector: u16::from_le_bytes([sector[48], sector[49]]),
            backup_boot_sector: u16::from_le_bytes([sector[50], sector[51]]),
            volume_id: u32::from_le_bytes(sector[67..71].try_into().unwrap()),
            volume_label,
        })
    }
}

/// Sectors per FAT needed to address every cluster of a partition:
/// `ceil((total - reserved) / ((256 * sectors_per_cluster + fats) / 2))`.
pub fn sectors_per_fat(total_sectors: u32, reserved_sectors: u32, sectors_per_cluster: u32, num_fats: u32) -> u32 {
    let numerator = total_sectors - reserved_sectors;
    let divisor = (256 * sectors_per_cluster + num_fats) / 2;
    numerator.div_ceil(divisor)
}

/// Free-space bookkeeping cached in the FSInfo sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    /// Free cluster count, or [`FSINFO_UNKNOWN`].
    pub free_count: u32,
    /// Where the allocator should start scanning for free clusters.
    pub next_free: u32,
}

impl FsInfo {
    pub fn encode(&self, sector: &mut [u8]) {
        sector.fill(0);
        sector[0..4].copy_from_slice(&FSINFO_LEAD_SIG.to_le_bytes());
        sector[484..488].copy_from_slice(&FSINFO_STRUC_SIG.to_le_bytes());
        sector[488..492].copy_from_slice(&self.free_count.to_le_bytes());
        sector[492..496].copy_from_slice(&self.next_free.to_le_bytes());
        sector[508..512].copy_from_slice(&FSINFO_TRAIL_SIG.to_le_bytes());
    }

    pub fn decode(sector: &[u8]) -> Self {
        Self {
            free_count: u32::from_le_bytes(sector[488..492].try_into().unwrap()),
            next_free: u32::from_le_bytes(sector[492..496].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BootRecord {
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
            volume_id: 0x1234_5678,
            volume_label: *b"EFI SYSTEM ",
        }
    }

    #[test]
    fn boot_record_round_trips() {
        let record = sample();
        let mut sector = vec![0u8; 512];
        record.encode(&mut sector);

        assert_eq!(&sector[0..3], &[0xEB, 0x58, 0x90]);
        assert_eq!(&sector[82..90], b"FAT32   ");
        assert_eq!(&sector[510..512], &[0x55, 0xAA]);
        assert_eq!(BootRecord::decode(&sector).unwrap(), record);
    }

    #[test]
    fn signature_lands_at_sector_end_for_large_sectors() {
        let mut record = sample();
        record.bytes_per_sector = 4096;
        let mut sector = vec![0u8; 4096];
        record.encode(&mut sector);
        assert_eq!(&sector[4094..4096], &[0x55, 0xAA]);
        assert_eq!(BootRecord::decode(&sector).unwrap(), record);
    }

    #[test]
    fn decode_rejects_missing_signature() {
        let sector = vec![0u8; 512];
        assert!(BootRecord::decode(&sector).is_err());
    }

    #[test]
    fn fat_sizing_addresses_every_cluster() {
        for total in [67584u32, 133_120, 1_000_000] {
            for lba_size in [512u32, 1024, 2048, 4096] {
                let spf = sectors_per_fat(total, 32, 1, 2);
                // Entries addressable by the FAT must cover every data
                // cluster (plus the two reserved entries).
                let data_sectors = total - 32 - 2 * spf;
                let clusters = data_sectors;
                assert!(
                    u64::from(spf) * u64::from(lba_size) / 4 >= u64::from(clusters) + 2,
                    "spf {spf} cannot address {clusters} clusters at {lba_size}B sectors"
                );
            }
        }
    }

    #[test]
    fn fsinfo_round_trips() {
        let info = FsInfo {
            free_count: 66_501,
            next_free: 5,
        };
        let mut sector = vec![0u8; 512];
        info.encode(&mut sector);
        assert_eq!(
            u32::from_le_bytes(sector[0..4].try_into().unwrap()),
            FSINFO_LEAD_SIG
        );
        assert_eq!(
            u32::from_le_bytes(sector[508..512].try_into().unwrap()),
            FSINFO_TRAIL_SIG
        );
        assert_eq!(FsInfo::decode(&sector), info);
    }
}
