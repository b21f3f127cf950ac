//! Element kinds that can be stored in an encoded array.

use super::array::{AnyArray, Array};
use super::encoded::TypeFlags;
use crate::error::{BinstackError, Result};
use crate::types::{MEMORY_ALIGNMENT, round_up};
use std::fmt;

/// The closed set of element types an array record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `i16`
    I16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `u64`
    U64,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// NUL-terminated UTF-8 strings.
    Str,
}

impl ElementKind {
    /// Encoded size of one element; 0 for strings, which are variable.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
            Self::Str => 0,
        }
    }

    /// Row stride in bytes for an array of this kind.
    ///
    /// Rows are padded to the alignment and always hold at least one
    /// element's worth of bytes. String arrays are packed and have no
    /// stride.
    pub const fn stride_for(self, width: usize) -> usize {
        match self {
            Self::Str => 0,
            _ => {
                let width = if width == 0 { 1 } else { width };
                round_up(width * self.byte_size(), MEMORY_ALIGNMENT)
            }
        }
    }

    /// The type word describing this kind.
    pub const fn flags(self) -> TypeFlags {
        let size = self.byte_size() as u32;
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => TypeFlags::integer(false, size),
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => TypeFlags::integer(true, size),
            Self::F32 | Self::F64 => TypeFlags::float(size),
            Self::Str => TypeFlags::string(),
        }
    }

    /// Dispatch on `(is_string, is_float, is_signed, byte_size)`.
    pub fn from_flags(flags: TypeFlags) -> Result<Self> {
        if flags.is_string() {
            return Ok(Self::Str);
        }

        let kind = if !flags.is_basic_type() {
            None
        } else if flags.is_float() {
            match flags.byte_size() {
                4 => Some(Self::F32),
                8 => Some(Self::F64),
                _ => None,
            }
        } else if flags.is_integer() {
            match (flags.is_signed(), flags.byte_size()) {
                (false, 1) => Some(Self::U8),
                (true, 1) => Some(Self::I8),
                (false, 2) => Some(Self::U16),
                (true, 2) => Some(Self::I16),
                (false, 4) => Some(Self::U32),
                (true, 4) => Some(Self::I32),
                (false, 8) => Some(Self::U64),
                (true, 8) => Some(Self::I64),
                _ => None,
            }
        } else {
            None
        };

        kind.ok_or_else(|| BinstackError::UnsupportedType {
            cause: format!("no element kind for type word {:#010x}", flags.bits()),
        })
    }

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "string",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type that maps onto one [`ElementKind`].
pub trait Element: Clone + Default + PartialEq + fmt::Debug + Sized + 'static {
    /// The kind this type encodes as.
    const KIND: ElementKind;

    /// Bytes this value occupies when encoded.
    fn encoded_len(&self) -> usize;

    /// Write the value into the front of `out`, which holds at least
    /// `encoded_len()` bytes.
    fn encode(&self, out: &mut [u8]);

    /// Read one value from the front of `input` and advance it.
    fn decode(input: &mut &[u8]) -> Result<Self>;

    /// Wrap a typed array.
    fn into_any(array: Array<Self>) -> AnyArray;

    /// Unwrap a typed array, failing if the kind differs.
    fn from_any(any: AnyArray) -> Result<Array<Self>>;
}

fn kind_mismatch(expected: ElementKind, found: ElementKind) -> BinstackError {
    BinstackError::UnsupportedType {
        cause: format!("expected {} elements, found {}", expected, found),
    }
}

macro_rules! numeric_element {
    ($ty:ty, $kind:ident) => {
        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            fn encoded_len(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode(&self, out: &mut [u8]) {
                out[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
            }

            fn decode(input: &mut &[u8]) -> Result<Self> {
                const N: usize = std::mem::size_of::<$ty>();
                if input.len() < N {
                    return Err(BinstackError::short_buffer(N, input.len()));
                }
                let (head, rest) = input.split_at(N);
                let mut raw = [0u8; N];
                raw.copy_from_slice(head);
                *input = rest;
                Ok(<$ty>::from_le_bytes(raw))
            }

            fn into_any(array: Array<Self>) -> AnyArray {
                AnyArray::$kind(array)
            }

            fn from_any(any: AnyArray) -> Result<Array<Self>> {
                match any {
                    AnyArray::$kind(array) => Ok(array),
                    other => Err(kind_mismatch(Self::KIND, other.kind())),
                }
            }
        }
    };
}

numeric_element!(u8, U8);
numeric_element!(i8, I8);
numeric_element!(u16, U16);
numeric_element!(i16, I16);
numeric_element!(u32, U32);
numeric_element!(i32, I32);
numeric_element!(u64, U64);
numeric_element!(i64, I64);
numeric_element!(f32, F32);
numeric_element!(f64, F64);

impl Element for String {
    const KIND: ElementKind = ElementKind::Str;

    fn encoded_len(&self) -> usize {
        self.len() + 1
    }

    fn encode(&self, out: &mut [u8]) {
        out[..self.len()].copy_from_slice(self.as_bytes());
        out[self.len()] = 0;
    }

    fn decode(input: &mut &[u8]) -> Result<Self> {
        let end = input
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| BinstackError::short_buffer(input.len() + 1, input.len()))?;
        let text = std::str::from_utf8(&input[..end]).map_err(|e| BinstackError::Format {
            cause: format!("string element is not valid UTF-8: {}", e),
        })?;
        let text = text.to_string();
        *input = &input[end + 1..];
        Ok(text)
    }

    fn into_any(array: Array<Self>) -> AnyArray {
        AnyArray::Str(array)
    }

    fn from_any(any: AnyArray) -> Result<Array<Self>> {
        match any {
            AnyArray::Str(array) => Ok(array),
            other => Err(kind_mismatch(Self::KIND, other.kind())),
        }
    }
}
