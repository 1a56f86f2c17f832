//! Path splitting and 8.3 short-name conversion.

use log::warn;

use crate::error::FormatError;

/// Split an absolute, slash-delimited path into its segments.
///
/// Returns a restartable (cloneable) iterator; validation happens up
/// front so iteration itself cannot fail. Empty segments (`//`, trailing
/// slash) and the bare root are rejected.
pub fn path_segments(path: &str) -> Result<std::str::Split<'_, char>, FormatError> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| FormatError::NotAbsolute(path.to_string()))?;
    if rest.is_empty() || rest.split('/').any(str::is_empty) {
        return Err(FormatError::EmptySegment(path.to_string()));
    }
    Ok(rest.split('/'))
}

/// Convert one path segment to its fixed 11-byte 8.3 form: name and
/// extension split at the last dot, each truncated and space padded,
/// ASCII uppercased. Over-long parts are truncated with a warning, never
/// an error.
pub fn short_name(segment: &str) -> [u8; 11] {
    let (stem, ext) = match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (segment, ""),
    };

    if stem.len() > 8 || ext.len() > 3 {
        warn!("name {segment:?} does not fit 8.3, truncating");
    }

    let mut name = [b' '; 11];
    for (dst, byte) in name[..8].iter_mut().zip(stem.bytes()) {
        *dst = byte.to_ascii_uppercase();
    }
    for (dst, byte) in name[8..].iter_mut().zip(ext.bytes()) {
        *dst = byte.to_ascii_uppercase();
    }
    name
}
