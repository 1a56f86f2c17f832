//! Random version-4 GUID generation.
//!
//! GPT stores GUIDs in their on-disk mixed-endian layout; `uguid::Guid`
//! models exactly that, so the random bytes are used as-is with only the
//! version and variant bits forced.

use uguid::Guid;

/// Fresh random identifier with the version nibble set to 4 and the
/// variant bits set to `10`. No uniqueness guarantee beyond the random
/// source; GPT identifiers are advisory.
pub fn new_v4() -> Guid {
    let mut bytes: [u8; 16] = rand::random();
    // time_hi_and_version is little-endian at bytes 6..8: the version
    // nibble is the high nibble of byte 7.
    bytes[7] = (bytes[7] & 0x0F) | 0x40;
    // clock_seq_hi_and_reserved: variant `10` in the top two bits.
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Guid::from_bytes(bytes)
}
