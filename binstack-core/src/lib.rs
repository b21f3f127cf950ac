//! binstack core library
//!
//! Binary memory backbone for embedded vision and robotics code: a guarded
//! stack allocator over caller-supplied memory, self-describing records
//! built on it, and the file and codec formats that move those records
//! between devices and tools.
//!
//! # Key Components
//!
//! - **Stack**: bump allocator whose segments are framed with a length word
//!   and guard words, plus strict and reconstructing iterators
//! - **Serialize**: typed records (strings, raw bytes, basic-type buffers,
//!   arrays, array slices, RLE images) and the outer framing that locates a
//!   buffer inside an arbitrary byte stream
//! - **File**: single-array binary files, optionally zlib-compressed
//! - **RLE**: run-length codec for binary images
//!
//! # Example
//!
//! ```
//! use binstack_core::prelude::*;
//!
//! let mut region = vec![0u8; 4096];
//! let mut buffer = SerializedBuffer::new(&mut region);
//!
//! let image = Array::from_vec(2, 3, vec![1u8, 2, 3, 4, 5, 6])?;
//! buffer.push_back_array("image", &image)?;
//!
//! // Ship the framed bytes somewhere, then find them again.
//! let wire = buffer.framed_bytes();
//! let view = SerializedView::find_in(&wire)?;
//! let record = view.records().next().expect("one record")?;
//! assert_eq!(record.decode_array_as::<u8>()?, image);
//! # Ok::<(), binstack_core::BinstackError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod file;
pub mod prelude;
pub mod rle;
pub mod serialize;
pub mod stack;
pub mod types;

// Re-export key types at crate root for convenience
pub use error::{BinstackError, Result};
pub use file::{ArrayFile, SaveOptions};
pub use serialize::{AnyArray, Array, Record, SerializedBuffer, SerializedView};
pub use stack::{MemoryStack, StackConfig, StackView};
pub use types::{Segment, StackId, StackOffset};
