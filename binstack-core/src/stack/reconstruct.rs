//! Guard-scanning iterator that recovers segments from damaged data.

use super::framing::{END_GUARD_BYTES, SEGMENT_HEADER_LEN, START_GUARD_BYTES, read_u32};
use crate::types::{Segment, StackId, StackOffset};

/// A segment found by scanning for guard words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredSegment {
    payload: StackOffset,
    reported_len: usize,
    recovered_len: usize,
}

impl RecoveredSegment {
    /// Offset of the payload.
    pub fn offset(&self) -> StackOffset {
        self.payload
    }

    /// Length stored in the header word.
    pub fn reported_len(&self) -> usize {
        self.reported_len
    }

    /// Distance from the payload start to the END guard that closes it.
    pub fn recovered_len(&self) -> usize {
        self.recovered_len
    }

    /// True if the header and the guard positions agree.
    pub fn lengths_agree(&self) -> bool {
        self.reported_len == self.recovered_len
    }

    /// The segment bounded by the END guard.
    pub fn recovered(&self) -> Segment {
        Segment::new(self.payload, self.recovered_len)
    }

    /// The segment bounded by the header's length word.
    pub fn reported(&self) -> Segment {
        Segment::new(self.payload, self.reported_len)
    }
}

/// Walks segments by searching for guard words instead of trusting lengths.
///
/// From the cursor it finds the next START guard, reads the length word
/// just before it. If the length word points at an END guard the segment
/// ends there; otherwise it ends at the first END guard after the payload
/// start. Scanning resumes after that END guard, so a corrupted length word costs
/// at most the one segment it belongs to. A START guard with no END guard
/// after it is a truncated tail and ends iteration.
#[derive(Debug, Clone)]
pub struct ReconstructingIter<'a> {
    bytes: &'a [u8],
    cursor: usize,
    exhausted: bool,
    id: StackId,
}

impl<'a> ReconstructingIter<'a> {
    /// Scan `bytes` from the start.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: 0,
            exhausted: false,
            id: StackId::default(),
        }
    }

    pub(crate) fn with_id(mut self, id: StackId) -> Self {
        self.id = id;
        self
    }

    /// The scanned bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Borrow the bytes of a segment, clamped to the scanned region.
    pub fn bytes(&self, segment: Segment) -> Option<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        bytes.get(segment.range())
    }
}

fn find(haystack: &[u8], from: usize, needle: &[u8; 4]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}

impl Iterator for ReconstructingIter<'_> {
    type Item = RecoveredSegment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        // The length word must precede the guard inside the buffer.
        let mut search = self.cursor.max(SEGMENT_HEADER_LEN - 4);
        let start = loop {
            let Some(found) = find(self.bytes, search, &START_GUARD_BYTES) else {
                self.exhausted = true;
                return None;
            };
            if found >= SEGMENT_HEADER_LEN - 4 {
                break found;
            }
            search = found + 1;
        };

        let payload = start + 4;
        let reported_len = read_u32(self.bytes, start - 4).unwrap_or(0) as usize;

        // A length word that lands on an END guard wins over the scan.
        let reported_end = payload.checked_add(reported_len).filter(|_| reported_len > 0);
        let at_reported = reported_end
            .and_then(|end| self.bytes.get(end..end.checked_add(END_GUARD_BYTES.len())?))
            .is_some_and(|w| w == &END_GUARD_BYTES[..]);

        let end = if at_reported {
            reported_end
        } else {
            find(self.bytes, payload, &END_GUARD_BYTES)
        };
        let Some(end) = end else {
            tracing::debug!(
                stack = %self.id,
                offset = payload,
                reported_len,
                "START guard without END guard, treating as truncated tail"
            );
            self.exhausted = true;
            return None;
        };

        let recovered = RecoveredSegment {
            payload: StackOffset::new(payload),
            reported_len,
            recovered_len: end - payload,
        };

        if !recovered.lengths_agree() {
            tracing::debug!(
                stack = %self.id,
                offset = payload,
                reported_len,
                recovered_len = recovered.recovered_len,
                "Recovered segment length disagrees with header"
            );
        }

        self.cursor = end + END_GUARD_BYTES.len();
        Some(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::MemoryStack;

    fn build(lens: &[usize]) -> Vec<u8> {
        let mut region = vec![0u8; 1024];
        let mut stack = MemoryStack::new(&mut region);
        for (i, &len) in lens.iter().enumerate() {
            let seg = stack.allocate(len).unwrap();
            stack.bytes_mut(seg).unwrap().fill(i as u8 + 1);
        }
        stack.as_bytes().to_vec()
    }

    #[test]
    fn clean_stack_matches_strict_walk() {
        let bytes = build(&[16, 32, 5]);
        let strict: Vec<Segment> = crate::stack::StackView::new(&bytes)
            .iter()
            .map(|s| s.unwrap())
            .collect();
        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(&bytes).collect();

        assert_eq!(recovered.len(), strict.len());
        for (r, s) in recovered.iter().zip(&strict) {
            assert!(r.lengths_agree());
            assert_eq!(r.recovered(), *s);
        }
    }

    #[test]
    fn bad_length_word_is_recovered_from_guards() {
        let mut bytes = build(&[16, 32, 16]);
        // Second segment: payload at 48, length word at 40.
        bytes[40..44].copy_from_slice(&0xDEADu32.to_le_bytes());

        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(&bytes).collect();
        assert_eq!(recovered.len(), 3);
        assert!(!recovered[1].lengths_agree());
        assert_eq!(recovered[1].reported_len(), 0xDEAD);
        assert_eq!(recovered[1].recovered_len(), 32);
        assert!(recovered[2].lengths_agree());
    }

    #[test]
    fn payload_spelling_end_guard_keeps_reported_length() {
        let mut region = vec![0u8; 256];
        let mut stack = MemoryStack::new(&mut region);
        let seg = stack.allocate(32).unwrap();
        let payload = stack.bytes_mut(seg).unwrap();
        payload.fill(0x11);
        payload[4..8].copy_from_slice(&END_GUARD_BYTES);
        let bytes = stack.as_bytes().to_vec();

        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(&bytes).collect();
        assert_eq!(recovered.len(), 1);
        assert!(recovered[0].lengths_agree());
        assert_eq!(recovered[0].recovered_len(), 32);
    }

    #[test]
    fn damaged_length_still_falls_back_to_first_guard() {
        let mut bytes = build(&[32, 16]);
        // First segment: payload at 16, length word at 8. Pointing it into
        // the payload misses the END guard, so the scan takes over.
        bytes[8..12].copy_from_slice(&16u32.to_le_bytes());

        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(&bytes).collect();
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].reported_len(), 16);
        assert_eq!(recovered[0].recovered_len(), 32);
    }

    #[test]
    fn truncated_tail_ends_iteration() {
        let bytes = build(&[16, 16]);
        let cut = &bytes[..bytes.len() - 2];

        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(cut).collect();
        assert_eq!(recovered.len(), 1);
    }

    #[test]
    fn no_guards_yields_nothing() {
        assert_eq!(ReconstructingIter::new(&[0u8; 64]).count(), 0);
    }

    #[test]
    fn finds_segments_after_leading_garbage() {
        let mut bytes = vec![0x55u8; 7];
        bytes.extend(build(&[16]));
        let recovered: Vec<RecoveredSegment> = ReconstructingIter::new(&bytes).collect();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].offset().as_usize(), 7 + 16);
        assert!(recovered[0].lengths_agree());
    }
}
