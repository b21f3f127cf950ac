//! Outer framing that marks a serialized buffer inside a byte stream.

use crate::error::{BinstackError, Result};
use std::ops::Range;

/// Marker written before the stack bytes.
pub const SERIALIZED_BUFFER_HEADER: [u8; 8] = [0xFF, 0x00, 0x00, 0xFE, 0x02, 0x03, 0x04, 0x05];

/// Marker written after the stack bytes.
pub const SERIALIZED_BUFFER_FOOTER: [u8; 8] = [0xFE, 0x00, 0x00, 0xFF, 0x05, 0x04, 0x03, 0x02];

/// Wrap stack bytes in header and footer markers.
pub fn frame(stack_bytes: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(
        SERIALIZED_BUFFER_HEADER.len() + stack_bytes.len() + SERIALIZED_BUFFER_FOOTER.len(),
    );
    framed.extend_from_slice(&SERIALIZED_BUFFER_HEADER);
    framed.extend_from_slice(stack_bytes);
    framed.extend_from_slice(&SERIALIZED_BUFFER_FOOTER);
    framed
}

/// Index one past the end of the first match of `pattern` at or after
/// `from`.
///
/// On a mismatch the match restarts at 1 if the byte equals the pattern's
/// first byte and at 0 otherwise.
fn match_pattern(raw: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    let mut matched = 0;
    for (i, &byte) in raw.iter().enumerate().skip(from) {
        if byte == pattern[matched] {
            matched += 1;
            if matched == pattern.len() {
                return Some(i + 1);
            }
        } else if byte == pattern[0] {
            matched = 1;
        } else {
            matched = 0;
        }
    }
    None
}

/// Locate a framed serialized buffer in `raw`.
///
/// Returns the range strictly between the first header marker and the first
/// footer marker after it.
pub fn find_serialized_buffer(raw: &[u8]) -> Result<Range<usize>> {
    let start = match_pattern(raw, 0, &SERIALIZED_BUFFER_HEADER).ok_or(BinstackError::NotFound {
        what: "serialized buffer header",
    })?;
    let end = match_pattern(raw, start, &SERIALIZED_BUFFER_FOOTER).ok_or(BinstackError::NotFound {
        what: "serialized buffer footer",
    })?;
    Ok(start..end - SERIALIZED_BUFFER_FOOTER.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_framed_region_in_noise() {
        let mut raw = vec![0x11, 0xFF, 0x00, 0x42];
        raw.extend(frame(&[1, 2, 3, 4, 5]));
        raw.extend_from_slice(&[0xFE, 0x00]);

        let range = find_serialized_buffer(&raw).unwrap();
        assert_eq!(&raw[range], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn restarts_on_repeated_first_byte() {
        let mut raw = vec![0xFF];
        raw.extend(frame(&[9]));
        let range = find_serialized_buffer(&raw).unwrap();
        assert_eq!(&raw[range], &[9]);
    }

    #[test]
    fn empty_region_between_markers() {
        let raw = frame(&[]);
        assert_eq!(find_serialized_buffer(&raw).unwrap(), 8..8);
    }

    #[test]
    fn missing_markers_are_not_found() {
        assert!(matches!(
            find_serialized_buffer(&[0u8; 32]),
            Err(BinstackError::NotFound { what: "serialized buffer header" })
        ));

        let raw = &frame(&[1, 2])[..12];
        assert!(matches!(
            find_serialized_buffer(raw),
            Err(BinstackError::NotFound { what: "serialized buffer footer" })
        ));
    }
}
