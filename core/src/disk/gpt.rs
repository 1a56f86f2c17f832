//! GUID Partition Table writer.
//!
//! Emits the mirrored primary/secondary header pair and their (byte
//! identical) partition entry arrays. All records are assembled at fixed
//! byte offsets into sector-sized buffers; nothing here depends on struct
//! layout.

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use uguid::{guid, Guid};

use crate::checksum::crc32;
use crate::error::BuildError;
use crate::geometry::{DiskGeometry, GPT_ENTRY_COUNT, GPT_ENTRY_SIZE};

pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
pub const GPT_REVISION: u32 = 0x0001_0000;
pub const GPT_HEADER_SIZE: u32 = 92;

/// EFI System Partition type identifier.
pub const ESP_TYPE_GUID: Guid = guid!("c12a7328-f81f-11d2-ba4b-00a0c93ec93b");

/// Basic Data partition type identifier.
pub const BASIC_DATA_TYPE_GUID: Guid = guid!("ebd0a0a2-b9e5-4433-87c0-68b6b72699c7");

/// One populated slot of the entry array.
#[derive(Debug, Clone)]
pub struct PartitionDescriptor {
    pub type_guid: Guid,
    pub unique_guid: Guid,
    /// First sector of the partition.
    pub first_lba: u64,
    /// Last sector of the partition, inclusive.
    pub last_lba: u64,
    /// Display name, stored as up to 36 UTF-16LE code units.
    pub name: &'static str,
}

/// Descriptor for the EFI System Partition, with a fresh unique id.
pub fn esp_partition(geometry: &DiskGeometry) -> PartitionDescriptor {
    PartitionDescriptor {
        type_guid: ESP_TYPE_GUID,
        unique_guid: crate::guid::new_v4(),
        first_lba: geometry.esp_lba,
        last_lba: geometry.esp_end_lba(),
        name: "EFI SYSTEM",
    }
}

/// Descriptor for the raw data partition, with a fresh unique id.
pub fn basic_data_partition(geometry: &DiskGeometry) -> PartitionDescriptor {
    PartitionDescriptor {
        type_guid: BASIC_DATA_TYPE_GUID,
        unique_guid: crate::guid::new_v4(),
        first_lba: geometry.data_lba,
        last_lba: geometry.data_end_lba(),
        name: "BASIC DATA",
    }
}

/// Build the 128-slot entry array, zero-padded to whole sectors.
pub fn encode_entry_array(geometry: &DiskGeometry, partitions: &[PartitionDescriptor]) -> Vec<u8> {
    let mut array = vec![0u8; (geometry.entry_array_lbas * geometry.lba_size) as usize];
    for (i, partition) in partitions.iter().enumerate() {
        let offset = i * GPT_ENTRY_SIZE as usize;
        encode_entry(&mut array[offset..offset + GPT_ENTRY_SIZE as usize], partition);
    }
    array
}

fn encode_entry(entry: &mut [u8], partition: &PartitionDescriptor) {
    entry[0..16].copy_from_slice(&partition.type_guid.to_bytes());
    entry[16..32].copy_from_slice(&partition.unique_guid.to_bytes());
    entry[32..40].copy_from_slice(&partition.first_lba.to_le_bytes());
    entry[40..48].copy_from_slice(&partition.last_lba.to_le_bytes());
    // Attributes stay zero.

    // Name: UTF-16LE, 36 code units max
    for (i, unit) in partition.name.encode_utf16().take(36).enumerate() {
        entry[56 + i * 2..58 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
}

/// Assemble one header sector. The self-CRC is computed over the 92
/// meaningful bytes with the CRC field zeroed, then patched in.
pub fn encode_header(
    geometry: &DiskGeometry,
    disk_guid: Guid,
    my_lba: u64,
    alternate_lba: u64,
    entry_array_lba: u64,
    entry_array_crc: u32,
) -> Vec<u8> {
    let mut header = vec![0u8; geometry.lba_size as usize];

    header[0..8].copy_from_slice(GPT_SIGNATURE);
    header[8..12].copy_from_slice(&GPT_REVISION.to_le_bytes());
    header[12..16].copy_from_slice(&GPT_HEADER_SIZE.to_le_bytes());
    // 16..20: header CRC, patched below; 20..24 reserved
    header[24..32].copy_from_slice(&my_lba.to_le_bytes());
    header[32..40].copy_from_slice(&alternate_lba.to_le_bytes());
    header[40..48].copy_from_slice(&geometry.first_usable_lba.to_le_bytes());
    header[48..56].copy_from_slice(&geometry.last_usable_lba.to_le_bytes());
    header[56..72].copy_from_slice(&disk_guid.to_bytes());
    header[72..80].copy_from_slice(&entry_array_lba.to_le_bytes());
    header[80..84].copy_from_slice(&(GPT_ENTRY_COUNT as u32).to_le_bytes());
    header[84..88].copy_from_slice(&(GPT_ENTRY_SIZE as u32).to_le_bytes());
    header[88..92].copy_from_slice(&entry_array_crc.to_le_bytes());

    let header_crc = crc32(&header[0..GPT_HEADER_SIZE as usize]);
    header[16..20].copy_from_slice(&header_crc.to_le_bytes());

    header
}

/// Write the full mirrored table set: primary header at LBA 1, primary
/// array right after it, secondary array ending at `last_lba - 1`, and the
/// secondary header at `last_lba`.
pub fn write_partition_tables<B: BlockIo>(
    block_io: &mut B,
    geometry: &DiskGeometry,
    disk_guid: Guid,
    partitions: &[PartitionDescriptor],
) -> Result<(), BuildError> {
    let array = encode_entry_array(geometry, partitions);
    let array_crc = crc32(&array[..(GPT_ENTRY_COUNT * GPT_ENTRY_SIZE) as usize]);

    let primary = encode_header(
        geometry,
        disk_guid,
        geometry.primary_header_lba,
        geometry.secondary_header_lba,
        geometry.primary_array_lba,
        array_crc,
    );
    // Secondary: my/alternate swapped, array relocated, own CRC; the array
    // CRC is unchanged because the array content is identical.
    let secondary = encode_header(
        geometry,
        disk_guid,
        geometry.secondary_header_lba,
        geometry.primary_header_lba,
        geometry.secondary_array_lba,
        array_crc,
    );

    block_io
        .write_blocks(Lba(geometry.primary_header_lba), &primary)
        .map_err(BuildError::io)?;
    block_io
        .write_blocks(Lba(geometry.primary_array_lba), &array)
        .map_err(BuildError::io)?;
    block_io
        .write_blocks(Lba(geometry.secondary_array_lba), &array)
        .map_err(BuildError::io)?;
    block_io
        .write_blocks(Lba(geometry.secondary_header_lba), &secondary)
        .map_err(BuildError::io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;

    fn test_setup() -> (DiskGeometry, Vec<PartitionDescriptor>) {
        let geometry = DiskGeometry::plan(&BuildConfig::default()).unwrap();
        let partitions = vec![esp_partition(&geometry), basic_data_partition(&geometry)];
        (geometry, partitions)
    }

    #[test]
    fn entry_array_places_both_partitions() {
        let (geometry, partitions) = test_setup();
        let array = encode_entry_array(&geometry, &partitions);

        assert_eq!(array.len() as u64, 32 * geometry.lba_size);

        let esp = &array[0..128];
        assert_eq!(&esp[0..16], &ESP_TYPE_GUID.to_bytes());
        assert_eq!(
            u64::from_le_bytes(esp[32..40].try_into().unwrap()),
            geometry.esp_lba
        );
        assert_eq!(
            u64::from_le_bytes(esp[40..48].try_into().unwrap()),
            geometry.esp_end_lba()
        );
        // "EFI SYSTEM" in UTF-16LE
        assert_eq!(&esp[56..60], &[b'E', 0, b'F', 0]);

        let data = &array[128..256];
        assert_eq!(&data[0..16], &BASIC_DATA_TYPE_GUID.to_bytes());
        assert_eq!(
            u64::from_le_bytes(data[40..48].try_into().unwrap()),
            geometry.data_end_lba()
        );

        // Remaining 126 slots are empty.
        assert!(array[256..].iter().all(|&b| b == 0));
    }

    #[test]
    fn header_crc_validates_with_crc_field_zeroed() {
        let (geometry, partitions) = test_setup();
        let array = encode_entry_array(&geometry, &partitions);
        let array_crc = crc32(&array[..16384]);
        let disk_guid = crate::guid::new_v4();

        let header = encode_header(&geometry, disk_guid, 1, geometry.secondary_header_lba, 2, array_crc);

        assert_eq!(&header[0..8], b"EFI PART");
        let stored_crc = u32::from_le_bytes(header[16..20].try_into().unwrap());
        let mut scratch = header[0..92].to_vec();
        scratch[16..20].fill(0);
        assert_eq!(crc32(&scratch), stored_crc);
        // Reserved tail of the sector is zero.
        assert!(header[92..].iter().all(|&b| b == 0));
    }

    #[test]
    fn mirrored_headers_differ_only_in_location_fields() {
        let (geometry, partitions) = test_setup();
        let array = encode_entry_array(&geometry, &partitions);
        let array_crc = crc32(&array[..16384]);
        let disk_guid = crate::guid::new_v4();

        let primary = encode_header(
            &geometry,
            disk_guid,
            geometry.primary_header_lba,
            geometry.secondary_header_lba,
            geometry.primary_array_lba,
            array_crc,
        );
        let secondary = encode_header(
            &geometry,
            disk_guid,
            geometry.secondary_header_lba,
            geometry.primary_header_lba,
            geometry.secondary_array_lba,
            array_crc,
        );

        // Neutralize my-LBA, alternate-LBA, entry-array-LBA and the CRC,
        // then the two sectors must be byte-identical.
        let mut a = primary.clone();
        let mut b = secondary.clone();
        for sector in [&mut a, &mut b] {
            sector[16..20].fill(0);
            sector[24..40].fill(0);
            sector[72..80].fill(0);
        }
        assert_eq!(a, b);
        assert_ne!(primary[24..32], secondary[24..32]);
        assert_eq!(primary[88..92], secondary[88..92], "array CRC is shared");
    }
}
