//! Tagged, self-describing records stored in a guarded stack.
//!
//! Every record is one stack segment laid out as
//!
//! ```text
//! ┌──────────────────┬──────────────────┬──────────────────────────┐
//! │ type_name [32]   │ object_name [32] │ payload                  │
//! │ NUL-terminated   │ NUL-terminated   │ header + data, by type   │
//! └──────────────────┴──────────────────┴──────────────────────────┘
//! ```
//!
//! The type name tells a reader which header starts the payload; see
//! [`record_type`]. A finished buffer is shipped as
//! `SERIALIZED_BUFFER_HEADER ‖ stack bytes ‖ SERIALIZED_BUFFER_FOOTER` so
//! it can be found again in an arbitrary byte dump.

mod array;
mod buffer;
mod element;
mod encoded;
mod framing;
mod record;
mod slice;

pub use array::{AnyArray, Array, BufferFlags};
pub use buffer::{
    DESCRIPTION_STRING_LENGTH, MAX_STRING_LENGTH, RECORD_PREFIX_LEN, SerializedBuffer,
    SerializedView,
};
pub use element::{Element, ElementKind};
pub use encoded::{
    EncodedArray, EncodedArraySlice, EncodedBasicTypeBuffer, EncodedBinaryImage, TypeFlags,
};
pub use framing::{
    SERIALIZED_BUFFER_FOOTER, SERIALIZED_BUFFER_HEADER, find_serialized_buffer, frame,
};
pub use record::{
    ReconstructingRecordIter, Record, RecordIter, RecoveredRecord, RecoveryPolicy,
};
pub use slice::{ArraySlice, LinearSequence};

/// Type names written into the first description string.
pub mod record_type {
    /// NUL-terminated text.
    pub const STRING: &str = "String";
    /// Opaque bytes.
    pub const RAW: &str = "Raw";
    /// [`EncodedBasicTypeBuffer`](super::EncodedBasicTypeBuffer) and values.
    pub const BASIC_TYPE: &str = "BasicType";
    /// [`EncodedArray`](super::EncodedArray) and rows.
    pub const ARRAY: &str = "Array";
    /// [`EncodedArraySlice`](super::EncodedArraySlice) and the full array.
    pub const ARRAY_SLICE: &str = "ArraySlice";
    /// [`EncodedBinaryImage`](super::EncodedBinaryImage) and RLE bytes.
    pub const BINARY_IMAGE: &str = "BinaryImageRLE";
}
