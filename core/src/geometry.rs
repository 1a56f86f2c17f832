//! Disk geometry planning.
//!
//! Runs once per build, before anything is written: turns the configured
//! sizes into the full sector layout (partition table regions, aligned
//! partition starts, usable range). Every later component computes absolute
//! LBAs from the resulting [`DiskGeometry`] and never re-derives them.

use log::debug;

use crate::config::BuildConfig;
use crate::error::ConfigError;

/// Partition alignment unit in bytes.
pub const ALIGNMENT: u64 = 1024 * 1024;

/// GPT partition entry size in bytes (fixed by the UEFI spec).
pub const GPT_ENTRY_SIZE: u64 = 128;

/// Number of entries in each GPT entry array (fixed at the usual 128).
pub const GPT_ENTRY_COUNT: u64 = 128;

/// Ceiling division of a byte count into sectors. Zero bytes is zero
/// sectors.
pub fn bytes_to_lbas(bytes: u64, lba_size: u64) -> u64 {
    (bytes / lba_size) + u64::from(bytes % lba_size > 0)
}

/// Next alignment boundary strictly after `lba`.
///
/// Always advances: an LBA already sitting on a boundary moves a full
/// alignment unit forward. Callers pass the last *occupied* sector of the
/// previous region, so the result is the first usable aligned sector after
/// it.
pub fn next_aligned_lba(lba: u64, align_lbas: u64) -> u64 {
    lba - (lba % align_lbas) + align_lbas
}

/// Minimum ESP size for FAT32 at the given sector size.
pub fn min_esp_bytes(lba_size: u64) -> u64 {
    let mib = match lba_size {
        512 => 33,
        1024 => 65,
        2048 => 129,
        _ => 257,
    };
    mib * 1024 * 1024
}

/// Complete sector layout of one image. Immutable once planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    /// Logical sector size in bytes.
    pub lba_size: u64,
    /// Sectors per alignment unit (1 MiB).
    pub align_lbas: u64,
    /// Total image size in bytes.
    pub image_size: u64,
    /// Total image size in sectors.
    pub total_lbas: u64,
    /// Sectors occupied by one GPT entry array.
    pub entry_array_lbas: u64,
    /// Primary GPT header sector (always 1).
    pub primary_header_lba: u64,
    /// First sector of the primary entry array (always 2).
    pub primary_array_lba: u64,
    /// First sector of the secondary entry array, ending at `total_lbas - 2`.
    pub secondary_array_lba: u64,
    /// Secondary GPT header sector (always the last).
    pub secondary_header_lba: u64,
    /// First sector a partition may occupy.
    pub first_usable_lba: u64,
    /// Last sector a partition may occupy.
    pub last_usable_lba: u64,
    /// EFI System Partition start and length.
    pub esp_lba: u64,
    pub esp_lbas: u64,
    /// Data partition start and length.
    pub data_lba: u64,
    pub data_lbas: u64,
}

impl DiskGeometry {
    /// Validate the configured sizes and lay out the whole disk.
    pub fn plan(config: &BuildConfig) -> Result<Self, ConfigError> {
        let lba_size = config.lba_size;
        if !matches!(lba_size, 512 | 1024 | 2048 | 4096) {
            return Err(ConfigError::UnsupportedSectorSize(lba_size));
        }

        let min_esp = min_esp_bytes(lba_size);
        if config.esp_size < min_esp {
            return Err(ConfigError::EspTooSmall {
                got: config.esp_size,
                min: min_esp,
                lba_size,
            });
        }
        if config.data_size < lba_size {
            return Err(ConfigError::DataTooSmall { lba_size });
        }

        let align_lbas = ALIGNMENT / lba_size;
        let entry_array_bytes = GPT_ENTRY_SIZE * GPT_ENTRY_COUNT;
        let entry_array_lbas = bytes_to_lbas(entry_array_bytes, lba_size);

        // Fixed padding: MBR + two headers, both entry arrays, and the two
        // alignment gaps in front of the partitions. Generous enough that
        // the secondary GPT always fits behind the data partition.
        let padding = 2 * ALIGNMENT + 3 * lba_size + 2 * entry_array_bytes;
        let image_size = config.esp_size + config.data_size + padding;
        let total_lbas = bytes_to_lbas(image_size, lba_size);

        let primary_header_lba = 1;
        let primary_array_lba = 2;
        let primary_array_end = primary_array_lba + entry_array_lbas - 1;

        let esp_lbas = bytes_to_lbas(config.esp_size, lba_size);
        let esp_lba = next_aligned_lba(primary_array_end, align_lbas);

        let data_lbas = bytes_to_lbas(config.data_size, lba_size);
        let data_lba = next_aligned_lba(esp_lba + esp_lbas - 1, align_lbas);

        let secondary_header_lba = total_lbas - 1;
        let secondary_array_lba = secondary_header_lba - entry_array_lbas;

        let geometry = Self {
            lba_size,
            align_lbas,
            image_size,
            total_lbas,
            entry_array_lbas,
            primary_header_lba,
            primary_array_lba,
            secondary_array_lba,
            secondary_header_lba,
            first_usable_lba: primary_array_end + 1,
            last_usable_lba: secondary_array_lba - 1,
            esp_lba,
            esp_lbas,
            data_lba,
            data_lbas,
        };

        debug_assert_eq!(geometry.esp_lba % align_lbas, 0);
        debug_assert_eq!(geometry.data_lba % align_lbas, 0);
        debug_assert!(geometry.data_lba + data_lbas - 1 <= geometry.last_usable_lba);

        debug!(
            "planned geometry: {} sectors of {} bytes, esp @{} ({} lbas), data @{} ({} lbas)",
            geometry.total_lbas, lba_size, esp_lba, esp_lbas, data_lba, data_lbas
        );

        Ok(geometry)
    }

    /// Last sector of the ESP (inclusive).
    pub fn esp_end_lba(&self) -> u64 {
        self.esp_lba + self.esp_lbas - 1
    }

    /// Last sector of the data partition (inclusive).
    pub fn data_end_lba(&self) -> u64 {
        self.data_lba + self.data_lbas - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_lbas_is_ceiling_division() {
        for lba_size in [512u64, 1024, 2048, 4096] {
            assert_eq!(bytes_to_lbas(0, lba_size), 0);
            assert_eq!(bytes_to_lbas(1, lba_size), 1);
            assert_eq!(bytes_to_lbas(lba_size, lba_size), 1);
            assert_eq!(bytes_to_lbas(lba_size + 1, lba_size), 2);
            assert_eq!(bytes_to_lbas(10 * lba_size - 1, lba_size), 10);
        }
    }

    #[test]
    fn next_aligned_lba_always_advances() {
        let align = ALIGNMENT / 512;
        for lba in [0, 1, 33, align - 1, align, align + 1, 7 * align] {
            let next = next_aligned_lba(lba, align);
            assert!(next > lba, "next_aligned_lba({lba}) = {next} did not advance");
            assert_eq!(next % align, 0);
        }
        // Exactly on a boundary still moves a full unit forward.
        assert_eq!(next_aligned_lba(align, align), 2 * align);
    }

    #[test]
    fn rejects_bad_sector_sizes() {
        for bad in [0, 256, 513, 8192] {
            let config = BuildConfig::new(bad, 64 * 1024 * 1024, 1024 * 1024);
            assert_eq!(
                DiskGeometry::plan(&config),
                Err(ConfigError::UnsupportedSectorSize(bad))
            );
        }
    }

    #[test]
    fn rejects_undersized_esp() {
        let config = BuildConfig::new(512, 32 * 1024 * 1024, 1024 * 1024);
        assert!(matches!(
            DiskGeometry::plan(&config),
            Err(ConfigError::EspTooSmall { .. })
        ));
        // 4096-byte sectors need a much larger minimum.
        let config = BuildConfig::new(4096, 129 * 1024 * 1024, 1024 * 1024);
        assert!(matches!(
            DiskGeometry::plan(&config),
            Err(ConfigError::EspTooSmall { .. })
        ));
    }

    #[test]
    fn partitions_start_on_alignment_boundaries() {
        for lba_size in [512u64, 1024, 2048, 4096] {
            let config = BuildConfig::new(lba_size, min_esp_bytes(lba_size), 3 * 1024 * 1024);
            let geometry = DiskGeometry::plan(&config).unwrap();
            assert_eq!(geometry.esp_lba % geometry.align_lbas, 0);
            assert_eq!(geometry.data_lba % geometry.align_lbas, 0);
            assert!(geometry.esp_lba > geometry.primary_array_lba);
            assert!(geometry.data_lba > geometry.esp_end_lba());
            assert!(geometry.data_end_lba() <= geometry.last_usable_lba);
            assert_eq!(geometry.secondary_header_lba, geometry.total_lbas - 1);
        }
    }

    #[test]
    fn default_config_layout_matches_reference() {
        let geometry = DiskGeometry::plan(&BuildConfig::default()).unwrap();
        assert_eq!(geometry.entry_array_lbas, 32);
        assert_eq!(geometry.first_usable_lba, 34);
        // 1 MiB alignment at 512-byte sectors puts the ESP at LBA 2048.
        assert_eq!(geometry.esp_lba, 2048);
        assert_eq!(geometry.esp_lbas, 33 * 2048);
        // 33 MiB ESP ends exactly on a boundary, so the data partition is
        // adjacent and still aligned.
        assert_eq!(geometry.data_lba, 2048 + 33 * 2048);
    }
}
