//! Offset-based handles into a stack buffer.
//!
//! Allocations are referred to by position rather than by reference, so a
//! caller can hold several of them while continuing to allocate.

use std::fmt;
use std::ops::Range;

/// Byte offset from the start of a stack's (aligned) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StackOffset(usize);

impl StackOffset {
    /// Create a new stack offset.
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    /// Add a byte offset.
    #[must_use]
    pub const fn add(&self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for StackOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<usize> for StackOffset {
    fn from(offset: usize) -> Self {
        Self(offset)
    }
}

/// A contiguous byte region inside a stack buffer.
///
/// Returned by allocation and by the iterators; resolve it against the
/// owning stack with `MemoryStack::bytes` / `MemoryStack::bytes_mut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    offset: StackOffset,
    len: usize,
}

impl Segment {
    /// Create a new segment handle.
    #[must_use]
    pub const fn new(offset: StackOffset, len: usize) -> Self {
        Self { offset, len }
    }

    /// Offset of the first byte.
    #[must_use]
    pub const fn offset(&self) -> StackOffset {
        self.offset
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the segment spans no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset one past the last byte.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset.as_usize() + self.len
    }

    /// Byte range covered by this segment.
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset.as_usize()..self.end()
    }

    /// A sub-segment starting `skip` bytes in and spanning `len` bytes.
    ///
    /// Returns `None` if the sub-segment would not fit.
    #[must_use]
    pub fn sub(&self, skip: usize, len: usize) -> Option<Self> {
        if skip.checked_add(len)? > self.len {
            return None;
        }
        Some(Self::new(self.offset.add(skip), len))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment@{}[{}]", self.offset, self.len)
    }
}
