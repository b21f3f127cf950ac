//! Guarded stack allocator and the iterators that walk it.
//!
//! A [`MemoryStack`] hands out aligned segments from a single byte region.
//! Every segment is framed so the region can be walked later without any
//! side table:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ padding │ len │ START │ payload (aligned, len bytes) │ END   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ padding │ len │ START │ payload ...                  │ END   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ ...                                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two ways to walk a stack:
//!
//! - [`StackIter`] trusts each length word, re-validating it, and stops
//!   at the first inconsistency.
//! - [`ReconstructingIter`] ignores the chain of lengths and scans for
//!   guard words, so it can step over a damaged segment.

mod framing;
mod iter;
mod memory;
mod reconstruct;
mod view;

pub use framing::{END_GUARD, MAX_ALLOCATION, SEGMENT_FOOTER_LEN, SEGMENT_HEADER_LEN, START_GUARD};
pub use iter::StackIter;
pub use memory::{MemoryStack, StackConfig, StackScope, TopSegment};
pub use reconstruct::{ReconstructingIter, RecoveredSegment};
pub use view::{MAX_VALIDATION_SEGMENTS, StackView};
