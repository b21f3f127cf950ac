//! Stack allocator over a caller-supplied byte region.

use super::framing::{
    MAX_ALLOCATION, SEGMENT_FOOTER_LEN, SegmentLayout, payload_start,
};
use super::iter::StackIter;
use super::reconstruct::ReconstructingIter;
use super::view::StackView;
use crate::error::{BinstackError, Result};
use crate::types::{MEMORY_ALIGNMENT, Segment, StackId, round_down, round_up};
use std::ops::{Deref, DerefMut};

/// Configuration for a [`MemoryStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Identifier used in log output.
    pub id: StackId,
    /// Whether START/END guard words are written around each payload.
    pub guard_words: bool,
    /// Whether newly allocated payload bytes are zero-filled.
    pub zero_allocations: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            id: StackId::default(),
            guard_words: true,
            zero_allocations: false,
        }
    }
}

impl StackConfig {
    /// Set the identifier reported in logs.
    pub fn with_id(mut self, id: impl Into<StackId>) -> Self {
        self.id = id.into();
        self
    }

    /// Enable or disable guard words.
    ///
    /// Stacks built without guards can still be walked with the strict
    /// iterator as long as guard checking is not requested, but they cannot
    /// be reconstructed.
    pub fn with_guard_words(mut self, enabled: bool) -> Self {
        self.guard_words = enabled;
        self
    }

    /// Enable or disable zero-filling of new allocations.
    pub fn with_zero_allocations(mut self, enabled: bool) -> Self {
        self.zero_allocations = enabled;
        self
    }
}

/// A bump allocator that frames every allocation with a length word and
/// guard words so the region can later be walked or recovered.
///
/// The stack never owns its memory. On construction the start of the
/// region is advanced to the first 16-byte aligned address; all offsets the
/// stack reports are relative to that point.
///
/// # Example
///
/// ```
/// use binstack_core::stack::MemoryStack;
///
/// let mut region = vec![0u8; 1024];
/// let mut stack = MemoryStack::new(&mut region);
///
/// let seg = stack.allocate(24).unwrap();
/// stack.bytes_mut(seg).unwrap().copy_from_slice(&[7u8; 24]);
///
/// assert!(stack.is_valid());
/// assert_eq!(stack.iter().count(), 1);
/// ```
pub struct MemoryStack<'a> {
    buffer: &'a mut [u8],
    used: usize,
    used_before_last: usize,
    last: Option<Segment>,
    config: StackConfig,
}

impl<'a> MemoryStack<'a> {
    /// Create a stack with the default configuration.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self::with_config(buffer, StackConfig::default())
    }

    /// Create a stack with an explicit configuration.
    pub fn with_config(buffer: &'a mut [u8], config: StackConfig) -> Self {
        let skip = buffer
            .as_ptr()
            .align_offset(MEMORY_ALIGNMENT)
            .min(buffer.len());
        let (_, buffer) = buffer.split_at_mut(skip);

        tracing::trace!(
            stack = %config.id,
            total_bytes = buffer.len(),
            skipped = skip,
            "Memory stack created"
        );

        Self {
            buffer,
            used: 0,
            used_before_last: 0,
            last: None,
            config,
        }
    }

    /// The stack's identifier.
    pub fn id(&self) -> StackId {
        self.config.id
    }

    /// The stack's configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Usable bytes after alignment.
    pub fn total_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes consumed so far, including framing and padding.
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Bytes not yet consumed.
    pub fn remaining_bytes(&self) -> usize {
        self.buffer.len() - self.used
    }

    /// The most recent allocation, if any.
    pub fn last_allocation(&self) -> Option<Segment> {
        self.last
    }

    /// Allocate `requested` bytes.
    ///
    /// The returned segment has exactly `requested` bytes; the framed length
    /// is rounded up to the alignment.
    pub fn allocate(&mut self, requested: usize) -> Result<Segment> {
        self.allocate_at(self.used, requested)
    }

    /// Allocate `requested` bytes and keep the right to resize them.
    ///
    /// The returned token borrows the stack mutably, so no other allocation
    /// can be made until it is finished or dropped. Only the most recent
    /// allocation can therefore ever be resized.
    pub fn allocate_top(&mut self, requested: usize) -> Result<TopSegment<'_, 'a>> {
        let segment = self.allocate(requested)?;
        Ok(TopSegment {
            stack: self,
            segment,
        })
    }

    fn allocate_at(&mut self, cursor: usize, requested: usize) -> Result<Segment> {
        if requested == 0 || requested > MAX_ALLOCATION {
            return Err(BinstackError::InvalidParameter {
                name: "requested_bytes",
                cause: format!("{} is outside 1..={}", requested, MAX_ALLOCATION),
            });
        }

        let layout = SegmentLayout::new(
            payload_start(cursor),
            round_up(requested, MEMORY_ALIGNMENT),
        );

        if layout.end() > self.buffer.len() {
            let available = largest_from(cursor, self.buffer.len());
            tracing::debug!(
                stack = %self.config.id,
                requested,
                available,
                "Allocation failed"
            );
            return Err(BinstackError::OutOfMemory {
                requested,
                available,
            });
        }

        layout.write(self.buffer, self.config.guard_words);
        if self.config.zero_allocations {
            self.buffer[layout.payload..layout.footer()].fill(0);
        }

        let segment = Segment::new(layout.segment().offset(), requested);
        self.used_before_last = cursor;
        self.used = layout.end();
        self.last = Some(segment);
        Ok(segment)
    }

    /// Borrow the bytes of an allocation.
    pub fn bytes(&self, segment: Segment) -> Result<&[u8]> {
        self.check_segment(segment)?;
        Ok(&self.buffer[segment.range()])
    }

    /// Mutably borrow the bytes of an allocation.
    pub fn bytes_mut(&mut self, segment: Segment) -> Result<&mut [u8]> {
        self.check_segment(segment)?;
        Ok(&mut self.buffer[segment.range()])
    }

    fn check_segment(&self, segment: Segment) -> Result<()> {
        if segment.end() > self.used {
            return Err(BinstackError::InvalidParameter {
                name: "segment",
                cause: format!("{} extends past used bytes {}", segment, self.used),
            });
        }
        Ok(())
    }

    /// The largest `requested` value the next [`allocate`](Self::allocate)
    /// would satisfy.
    pub fn largest_possible_allocation(&self) -> usize {
        largest_from(self.used, self.buffer.len())
    }

    /// Walk every segment and confirm the framing is intact.
    ///
    /// Corruption is reported through `tracing` and as `false`, never as a
    /// panic.
    pub fn is_valid(&self) -> bool {
        self.view().is_valid()
    }

    /// Read-only view over the used portion of the stack.
    pub fn view(&self) -> StackView<'_> {
        StackView::new(&self.buffer[..self.used])
            .with_guard_words(self.config.guard_words)
            .with_id(self.config.id)
    }

    /// Strict iterator over the allocations.
    pub fn iter(&self) -> StackIter<'_> {
        self.view().iter()
    }

    /// Guard-scanning iterator over the allocations.
    pub fn reconstruct(&self) -> ReconstructingIter<'_> {
        self.view().reconstruct()
    }

    /// The used bytes of the stack, starting at the aligned origin.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.used]
    }

    /// Open a scratch scope.
    ///
    /// Allocations made through the returned guard are released when it is
    /// dropped, restoring the used-bytes watermark and last-allocation
    /// bookkeeping to their values at this call.
    pub fn scope(&mut self) -> StackScope<'_, 'a> {
        StackScope {
            saved: (self.used, self.used_before_last, self.last),
            stack: self,
        }
    }
}

fn largest_from(cursor: usize, total: usize) -> usize {
    let payload = payload_start(cursor);
    match total.checked_sub(payload + SEGMENT_FOOTER_LEN) {
        Some(room) => round_down(room, MEMORY_ALIGNMENT).min(round_down(MAX_ALLOCATION, MEMORY_ALIGNMENT)),
        None => 0,
    }
}

impl std::fmt::Debug for MemoryStack<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStack")
            .field("id", &self.config.id)
            .field("used", &self.used)
            .field("total", &self.buffer.len())
            .field("last", &self.last)
            .finish()
    }
}

/// The most recent allocation of a stack, still open for resizing.
///
/// ```compile_fail
/// use binstack_core::stack::MemoryStack;
///
/// let mut region = vec![0u8; 1024];
/// let mut stack = MemoryStack::new(&mut region);
/// let top = stack.allocate_top(16).unwrap();
/// // The stack is borrowed by `top`; a second allocation is rejected.
/// stack.allocate(16).unwrap();
/// let _ = top.resize(32);
/// ```
pub struct TopSegment<'s, 'a> {
    stack: &'s mut MemoryStack<'a>,
    segment: Segment,
}

impl<'s, 'a> TopSegment<'s, 'a> {
    /// The allocation as it currently stands.
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// The allocation's bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.stack.buffer[self.segment.range()]
    }

    /// Change the size of the allocation in place.
    ///
    /// Payload bytes are preserved up to the smaller of the old and new
    /// sizes. On failure the previous allocation is left untouched and the
    /// error is returned.
    pub fn resize(self, requested: usize) -> Result<TopSegment<'s, 'a>> {
        let Self { stack, segment } = self;
        let previous = (stack.used, stack.used_before_last, stack.last);
        let keep = segment.len().min(requested);

        // Preserve the bytes that zero-filling would clobber.
        let saved = stack.buffer[segment.offset().as_usize()..][..keep].to_vec();
        match stack.allocate_at(stack.used_before_last, requested) {
            Ok(resized) => {
                stack.buffer[resized.offset().as_usize()..][..keep].copy_from_slice(&saved);
                Ok(TopSegment {
                    stack,
                    segment: resized,
                })
            }
            Err(e) => {
                (stack.used, stack.used_before_last, stack.last) = previous;
                Err(e)
            }
        }
    }

    /// Release the borrow and return the final allocation.
    pub fn finish(self) -> Segment {
        self.segment
    }
}

/// Scratch scope over a [`MemoryStack`]; see [`MemoryStack::scope`].
pub struct StackScope<'s, 'a> {
    stack: &'s mut MemoryStack<'a>,
    saved: (usize, usize, Option<Segment>),
}

impl<'a> Deref for StackScope<'_, 'a> {
    type Target = MemoryStack<'a>;

    fn deref(&self) -> &Self::Target {
        &*self.stack
    }
}

impl DerefMut for StackScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.stack
    }
}

impl Drop for StackScope<'_, '_> {
    fn drop(&mut self) {
        (self.stack.used, self.stack.used_before_last, self.stack.last) = self.saved;
    }
}
