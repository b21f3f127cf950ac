//! Strict segment iterator.

use super::framing::{SEGMENT_FOOTER_LEN, check_segment, payload_start};
use crate::error::{BinstackError, Result};
use crate::types::{MEMORY_ALIGNMENT, Segment, StackId};

/// Walks segments by trusting each length word.
///
/// Every step re-validates the length (non-zero, aligned, in bounds) and,
/// when asked, both guard words. The first failure is yielded as a
/// [`BinstackError::Corruption`] and the iterator is exhausted afterwards;
/// there is no resynchronisation. Use
/// [`ReconstructingIter`](super::ReconstructingIter) for that.
#[derive(Debug, Clone)]
pub struct StackIter<'a> {
    bytes: &'a [u8],
    cursor: usize,
    require_guards: bool,
    exhausted: bool,
    id: StackId,
}

impl<'a> StackIter<'a> {
    /// Iterate over `bytes`, which must start at the stack origin and end at
    /// the used-bytes watermark.
    pub fn new(bytes: &'a [u8], require_guards: bool) -> Self {
        Self {
            bytes,
            cursor: 0,
            require_guards,
            exhausted: false,
            id: StackId::default(),
        }
    }

    pub(crate) fn with_id(mut self, id: StackId) -> Self {
        self.id = id;
        self
    }

    /// True if the used bytes past the cursor could hold another segment
    /// of at least one aligned block.
    pub fn has_next(&self) -> bool {
        !self.exhausted
            && payload_start(self.cursor) + MEMORY_ALIGNMENT + SEGMENT_FOOTER_LEN
                <= self.bytes.len()
    }

    /// Fetch the next segment, overriding the iterator's guard setting.
    pub fn next_segment(&mut self, require_guards: bool) -> Result<Segment> {
        if !self.has_next() {
            return Err(BinstackError::NotFound { what: "segment" });
        }

        match check_segment(self.bytes, self.cursor, require_guards) {
            Ok(layout) => {
                self.cursor = layout.end();
                Ok(layout.segment())
            }
            Err(e) => {
                tracing::warn!(
                    stack = %self.id,
                    cursor = self.cursor,
                    error = %e,
                    "Corrupted segment, stopping iteration"
                );
                self.exhausted = true;
                Err(e)
            }
        }
    }

    /// Borrow the bytes of a segment, or `None` if it lies outside the
    /// walked region.
    pub fn bytes(&self, segment: Segment) -> Option<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        bytes.get(segment.range())
    }
}

impl Iterator for StackIter<'_> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_segment(self.require_guards))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::MemoryStack;
    use crate::types::StackOffset;

    fn three_segments(region: &mut [u8]) -> Vec<u8> {
        let mut stack = MemoryStack::new(region);
        for (len, fill) in [(16usize, 1u8), (40, 2), (8, 3)] {
            let seg = stack.allocate(len).unwrap();
            stack.bytes_mut(seg).unwrap().fill(fill);
        }
        stack.as_bytes().to_vec()
    }

    #[test]
    fn yields_rounded_lengths_in_order() {
        let mut region = vec![0u8; 512];
        let bytes = three_segments(&mut region);
        let lens: Vec<usize> = StackIter::new(&bytes, true)
            .map(|s| s.unwrap().len())
            .collect();
        assert_eq!(lens, vec![16, 48, 16]);
    }

    #[test]
    fn payload_bytes_match_what_was_written() {
        let mut region = vec![0u8; 512];
        let bytes = three_segments(&mut region);
        let iter = StackIter::new(&bytes, true);
        let segs: Vec<Segment> = iter.clone().map(|s| s.unwrap()).collect();
        assert!(iter.bytes(segs[1]).unwrap()[..40].iter().all(|&b| b == 2));
        assert!(iter.bytes(segs[2]).unwrap()[..8].iter().all(|&b| b == 3));
    }

    #[test]
    fn foreign_segment_is_none() {
        let mut region = vec![0u8; 512];
        let bytes = three_segments(&mut region);
        let iter = StackIter::new(&bytes[..64], true);
        let far = Segment::new(StackOffset::new(400), 32);
        assert!(iter.bytes(far).is_none());
    }

    #[test]
    fn corrupted_length_stops_iteration() {
        let mut region = vec![0u8; 512];
        let mut bytes = three_segments(&mut region);
        // Length word of the second segment: payload at 48, header at 40.
        bytes[40..44].copy_from_slice(&17u32.to_le_bytes());

        let mut iter = StackIter::new(&bytes, true);
        assert!(iter.next().unwrap().is_ok());
        let err = iter.next().unwrap().unwrap_err();
        assert!(err.is_corruption());
        assert!(!iter.has_next());
        assert!(iter.next().is_none());
    }

    #[test]
    fn guard_check_is_per_call() {
        let mut region = vec![0u8; 512];
        let mut bytes = three_segments(&mut region);
        bytes[12] = 0;

        let mut iter = StackIter::new(&bytes, true);
        assert!(iter.next_segment(false).is_ok());

        let mut iter = StackIter::new(&bytes, true);
        assert!(iter.next_segment(true).is_err());
    }

    #[test]
    fn next_segment_past_end_is_not_found() {
        let mut iter = StackIter::new(&[], false);
        assert!(!iter.has_next());
        assert!(matches!(
            iter.next_segment(false),
            Err(BinstackError::NotFound { .. })
        ));
    }
}
