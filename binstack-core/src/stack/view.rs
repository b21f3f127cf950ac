//! Read-only view over a fully allocated stack.

use super::framing::check_segment;
use super::iter::StackIter;
use super::reconstruct::ReconstructingIter;
use crate::error::{BinstackError, Result};
use crate::types::{Segment, StackId};

/// Upper bound on segments visited by [`StackView::is_valid`].
pub const MAX_VALIDATION_SEGMENTS: usize = 1_000_000;

/// Read-only view of bytes laid out by a [`MemoryStack`](super::MemoryStack).
///
/// The whole slice counts as used: a view is what a reader gets after the
/// writer is done, typically a record block lifted out of a file or a
/// network frame. Offset zero of the slice is the stack origin.
#[derive(Debug, Clone, Copy)]
pub struct StackView<'a> {
    bytes: &'a [u8],
    guard_words: bool,
    id: StackId,
}

impl<'a> StackView<'a> {
    /// View `bytes` as a stack written with guard words.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            guard_words: true,
            id: StackId::default(),
        }
    }

    /// Declare whether the writer emitted guard words.
    pub fn with_guard_words(mut self, enabled: bool) -> Self {
        self.guard_words = enabled;
        self
    }

    /// Identifier reported in logs.
    pub fn with_id(mut self, id: impl Into<StackId>) -> Self {
        self.id = id.into();
        self
    }

    /// The viewed bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of used bytes.
    pub fn used_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Whether guard words are expected.
    pub fn has_guard_words(&self) -> bool {
        self.guard_words
    }

    /// Borrow the bytes of a segment.
    pub fn bytes(&self, segment: Segment) -> Result<&'a [u8]> {
        self.bytes
            .get(segment.range())
            .ok_or_else(|| BinstackError::InvalidParameter {
                name: "segment",
                cause: format!("{} extends past used bytes {}", segment, self.bytes.len()),
            })
    }

    /// Walk every segment from the origin and confirm the framing.
    ///
    /// Guard words are checked when the writer emitted them.
    pub fn is_valid(&self) -> bool {
        let mut cursor = 0;
        let mut visited = 0;

        while cursor < self.bytes.len() {
            if visited == MAX_VALIDATION_SEGMENTS {
                tracing::warn!(
                    stack = %self.id,
                    visited,
                    "Validation gave up: too many segments"
                );
                return false;
            }

            match check_segment(self.bytes, cursor, self.guard_words) {
                Ok(layout) => cursor = layout.end(),
                Err(e) => {
                    tracing::warn!(stack = %self.id, error = %e, "Stack failed validation");
                    return false;
                }
            }
            visited += 1;
        }
        true
    }

    /// Strict iterator; guard words are checked when the writer emitted them.
    pub fn iter(&self) -> StackIter<'a> {
        StackIter::new(self.bytes, self.guard_words).with_id(self.id)
    }

    /// Guard-scanning iterator for damaged or foreign data.
    pub fn reconstruct(&self) -> ReconstructingIter<'a> {
        ReconstructingIter::new(self.bytes).with_id(self.id)
    }
}
