//! Segment framing: guard words, header/footer layout and validation.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────┬────────────┐
//! │ length   │ START_GUARD  │ payload (length bytes)   │ END_GUARD  │
//! │ (u32 LE) │ (u32 LE)     │ 16-byte aligned start    │ (u32 LE)   │
//! └──────────┴──────────────┴──────────────────────────┴────────────┘
//! ```
//!
//! Padding between the end of one segment and the header of the next is
//! whatever it takes to put the next payload on an aligned offset.

use crate::error::{BinstackError, Result};
use crate::types::{MEMORY_ALIGNMENT, Segment, StackOffset, is_aligned, round_up};
use byteorder::{ByteOrder, LittleEndian};

/// Guard word written immediately before every payload.
pub const START_GUARD: u32 = 0xFF01_FF02;

/// Guard word written immediately after every payload.
pub const END_GUARD: u32 = 0x03FF_04FF;

/// Bytes occupied by `[length][START_GUARD]`.
pub const SEGMENT_HEADER_LEN: usize = 8;

/// Bytes occupied by `[END_GUARD]`.
pub const SEGMENT_FOOTER_LEN: usize = 4;

/// Largest request a single allocation may make.
pub const MAX_ALLOCATION: usize = 0x3FFF_FFFF;

/// Little-endian byte pattern of [`START_GUARD`].
pub(crate) const START_GUARD_BYTES: [u8; 4] = START_GUARD.to_le_bytes();

/// Little-endian byte pattern of [`END_GUARD`].
pub(crate) const END_GUARD_BYTES: [u8; 4] = END_GUARD.to_le_bytes();

/// Where the payload of the next segment starts, given the current cursor.
#[must_use]
pub(crate) const fn payload_start(cursor: usize) -> usize {
    round_up(cursor + SEGMENT_HEADER_LEN, MEMORY_ALIGNMENT)
}

/// Positions of one framed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentLayout {
    /// Offset of the payload (always aligned).
    pub payload: usize,
    /// Payload length (always a multiple of the alignment).
    pub length: usize,
}

impl SegmentLayout {
    pub(crate) const fn new(payload: usize, length: usize) -> Self {
        Self { payload, length }
    }

    pub(crate) const fn length_word(&self) -> usize {
        self.payload - SEGMENT_HEADER_LEN
    }

    pub(crate) const fn start_guard(&self) -> usize {
        self.payload - 4
    }

    pub(crate) const fn footer(&self) -> usize {
        self.payload + self.length
    }

    /// Offset one past the footer; the cursor for the next segment.
    pub(crate) const fn end(&self) -> usize {
        self.footer() + SEGMENT_FOOTER_LEN
    }

    pub(crate) const fn segment(&self) -> Segment {
        Segment::new(StackOffset::new(self.payload), self.length)
    }

    /// Write the header and footer words into `bytes`.
    ///
    /// The caller has already checked that `end()` fits.
    pub(crate) fn write(&self, bytes: &mut [u8], guard_words: bool) {
        let (start, end) = if guard_words {
            (START_GUARD, END_GUARD)
        } else {
            (0, 0)
        };
        write_u32(bytes, self.length_word(), self.length as u32);
        write_u32(bytes, self.start_guard(), start);
        write_u32(bytes, self.footer(), end);
    }
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at.checked_add(4)?).map(LittleEndian::read_u32)
}

pub(crate) fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    LittleEndian::write_u32(&mut bytes[at..at + 4], value);
}

/// Re-derive and validate the segment whose header follows `cursor`.
///
/// `bytes` must end at the stack's used-bytes watermark.
pub(crate) fn check_segment(
    bytes: &[u8],
    cursor: usize,
    require_guards: bool,
) -> Result<SegmentLayout> {
    let used = bytes.len();
    let payload = payload_start(cursor);

    if payload + SEGMENT_FOOTER_LEN > used {
        return Err(BinstackError::corruption(
            cursor,
            format!("segment header at {} runs past used bytes {}", payload, used),
        ));
    }

    let length = read_u32(bytes, payload - SEGMENT_HEADER_LEN).unwrap_or(0) as usize;
    if length == 0 || !is_aligned(length, MEMORY_ALIGNMENT) {
        return Err(BinstackError::corruption(
            payload,
            format!("segment length {} is not a positive multiple of {}", length, MEMORY_ALIGNMENT),
        ));
    }

    let layout = SegmentLayout::new(payload, length);
    if layout.end() > used {
        return Err(BinstackError::corruption(
            payload,
            format!(
                "segment length {} overruns used bytes {} (segment would end at {})",
                length,
                used,
                layout.end()
            ),
        ));
    }

    if require_guards {
        let start = read_u32(bytes, layout.start_guard());
        if start != Some(START_GUARD) {
            return Err(BinstackError::corruption(
                payload,
                format!("start guard mismatch: found {:#010x}", start.unwrap_or(0)),
            ));
        }

        let end = read_u32(bytes, layout.footer());
        if end != Some(END_GUARD) {
            return Err(BinstackError::corruption(
                payload,
                format!("end guard mismatch: found {:#010x}", end.unwrap_or(0)),
            ));
        }
    }

    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(length: usize) -> Vec<u8> {
        let layout = SegmentLayout::new(payload_start(0), length);
        let mut bytes = vec![0u8; layout.end()];
        layout.write(&mut bytes, true);
        bytes
    }

    #[test]
    fn payload_start_is_aligned() {
        assert_eq!(payload_start(0), 16);
        assert_eq!(payload_start(8), 16);
        assert_eq!(payload_start(9), 32);
        assert_eq!(payload_start(36), 48);
    }

    #[test]
    fn guard_bytes_are_little_endian() {
        assert_eq!(START_GUARD_BYTES, [0x02, 0xFF, 0x01, 0xFF]);
        assert_eq!(END_GUARD_BYTES, [0xFF, 0x04, 0xFF, 0x03]);
    }

    #[test]
    fn check_accepts_well_formed_segment() {
        let bytes = framed(32);
        let layout = check_segment(&bytes, 0, true).unwrap();
        assert_eq!(layout.payload, 16);
        assert_eq!(layout.length, 32);
        assert_eq!(layout.end(), bytes.len());
    }

    #[test]
    fn check_rejects_unaligned_length() {
        let mut bytes = framed(32);
        write_u32(&mut bytes, 8, 33);
        assert!(check_segment(&bytes, 0, false).is_err());
    }

    #[test]
    fn check_rejects_overrun() {
        let mut bytes = framed(32);
        write_u32(&mut bytes, 8, 64);
        assert!(check_segment(&bytes, 0, false).is_err());
    }

    #[test]
    fn check_guards_only_when_required() {
        let mut bytes = framed(16);
        bytes[12] ^= 0x01;
        assert!(check_segment(&bytes, 0, false).is_ok());
        assert!(check_segment(&bytes, 0, true).is_err());
    }
}
