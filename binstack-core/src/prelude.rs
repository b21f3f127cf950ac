//! Prelude for convenient imports.
//!
//! ```
//! use binstack_core::prelude::*;
//! ```

// Core types
pub use crate::types::{MEMORY_ALIGNMENT, Segment, StackId, StackOffset};

// Error handling
pub use crate::error::{BinstackError, Result};

// Stack
pub use crate::stack::{
    MemoryStack, ReconstructingIter, RecoveredSegment, StackConfig, StackIter, StackScope,
    StackView, TopSegment,
};

// Records
pub use crate::serialize::{
    AnyArray, Array, ArraySlice, Element, ElementKind, LinearSequence, Record, RecoveryPolicy,
    SerializedBuffer, SerializedView, find_serialized_buffer,
};

// Files
pub use crate::file::{ArrayFile, Compressor, FsProvider, SaveOptions};
