//! Typed 2-D arrays and their type-erased wrapper.

use super::element::{Element, ElementKind};
use super::encoded::EncodedArray;
use crate::error::{BinstackError, Result};
use std::fmt;

/// Allocation flags carried alongside an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// Every element has been written.
    pub const FULLY_ALLOCATED: Self = Self(1 << 0);
    /// Storage was zero-filled on allocation.
    pub const ZERO_ALLOCATED: Self = Self(1 << 1);
    /// Storage was framed with guard words.
    pub const GUARDED: Self = Self(1 << 2);

    /// Wrap a raw flags word.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw flags word.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every bit in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A dense row-major 2-D array.
///
/// The encoded form pads each row to [`stride`](Self::stride) bytes; the
/// in-memory form does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    height: usize,
    width: usize,
    flags: BufferFlags,
    data: Vec<T>,
}

impl<T: Element> Array<T> {
    /// A `height x width` array of default values.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            flags: BufferFlags::FULLY_ALLOCATED,
            data: vec![T::default(); height * width],
        }
    }

    /// Wrap row-major `data`.
    pub fn from_vec(height: usize, width: usize, data: Vec<T>) -> Result<Self> {
        if height.checked_mul(width) != Some(data.len()) {
            return Err(BinstackError::InvalidParameter {
                name: "data",
                cause: format!(
                    "{} elements cannot fill a {}x{} array",
                    data.len(),
                    height,
                    width
                ),
            });
        }
        Ok(Self {
            height,
            width,
            flags: BufferFlags::FULLY_ALLOCATED,
            data,
        })
    }

    /// Replace the buffer flags.
    #[must_use]
    pub fn with_flags(mut self, flags: BufferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Encoded bytes per row.
    pub fn stride(&self) -> usize {
        T::KIND.stride_for(self.width)
    }

    /// Buffer flags.
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at row `y`, column `x`.
    pub fn get(&self, y: usize, x: usize) -> Option<&T> {
        if y >= self.height || x >= self.width {
            return None;
        }
        self.data.get(y * self.width + x)
    }

    /// Mutable element at row `y`, column `x`.
    pub fn get_mut(&mut self, y: usize, x: usize) -> Option<&mut T> {
        if y >= self.height || x >= self.width {
            return None;
        }
        self.data.get_mut(y * self.width + x)
    }

    /// One row.
    pub fn row(&self, y: usize) -> Option<&[T]> {
        if y >= self.height {
            return None;
        }
        Some(&self.data[y * self.width..(y + 1) * self.width])
    }

    /// All elements, row-major.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// All elements, row-major, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Take the elements.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// The header describing this array.
    pub fn encoded_header(&self) -> Result<EncodedArray> {
        let word = |name: &'static str, value: usize| {
            u32::try_from(value).map_err(|_| BinstackError::InvalidParameter {
                name,
                cause: format!("{} does not fit in 32 bits", value),
            })
        };
        Ok(EncodedArray {
            flags: T::KIND.flags(),
            count: word("count", self.len())?,
            height: word("height", self.height)?,
            width: word("width", self.width)?,
            stride: word("stride", self.stride())?,
            buffer_flags: self.flags,
        })
    }

    /// Bytes the payload after the header occupies.
    pub fn encoded_data_len(&self) -> usize {
        match T::KIND {
            ElementKind::Str => self.data.iter().map(Element::encoded_len).sum(),
            _ => self.height * self.stride(),
        }
    }

    /// Write the payload into `out`, which holds exactly
    /// [`encoded_data_len`](Self::encoded_data_len) bytes.
    pub(crate) fn encode_data(&self, out: &mut [u8]) {
        let stride = self.stride();
        if stride == 0 {
            let mut at = 0;
            for value in &self.data {
                value.encode(&mut out[at..]);
                at += value.encoded_len();
            }
            return;
        }

        let size = T::KIND.byte_size();
        for (y, row) in out.chunks_exact_mut(stride).take(self.height).enumerate() {
            row.fill(0);
            for (x, value) in self.data[y * self.width..(y + 1) * self.width].iter().enumerate() {
                value.encode(&mut row[x * size..]);
            }
        }
    }

    /// Decode the payload that follows `header`.
    pub fn decode_data(header: &EncodedArray, data: &[u8]) -> Result<Self> {
        let kind = header.element_kind()?;
        if kind != T::KIND {
            return Err(BinstackError::UnsupportedType {
                cause: format!("expected {} elements, found {}", T::KIND, kind),
            });
        }

        let height = header.height as usize;
        let width = header.width as usize;
        let count = height.checked_mul(width).ok_or_else(|| BinstackError::Format {
            cause: format!("array shape {}x{} overflows", height, width),
        })?;
        if header.count as usize != count {
            return Err(BinstackError::Format {
                cause: format!(
                    "array count {} does not match shape {}x{}",
                    header.count, height, width
                ),
            });
        }

        let stride = header.stride as usize;
        let values = if kind == ElementKind::Str {
            // Every string carries at least its NUL terminator.
            if data.len() < count {
                return Err(BinstackError::short_buffer(count, data.len()));
            }
            let mut values = Vec::with_capacity(count);
            let mut input = data;
            for _ in 0..count {
                values.push(T::decode(&mut input)?);
            }
            values
        } else {
            let row_bytes = width * kind.byte_size();
            if stride < row_bytes {
                return Err(BinstackError::Format {
                    cause: format!("stride {} is narrower than a row of {} bytes", stride, row_bytes),
                });
            }
            let needed = height.saturating_mul(stride);
            if data.len() < needed {
                return Err(BinstackError::short_buffer(needed, data.len()));
            }
            let mut values = Vec::with_capacity(count);
            for y in 0..height {
                let mut row = &data[y * stride..y * stride + row_bytes];
                for _ in 0..width {
                    values.push(T::decode(&mut row)?);
                }
            }
            values
        };

        Ok(Self {
            height,
            width,
            flags: header.buffer_flags,
            data: values,
        })
    }
}

/// An array of any supported element kind.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum AnyArray {
    U8(Array<u8>),
    I8(Array<i8>),
    U16(Array<u16>),
    I16(Array<i16>),
    U32(Array<u32>),
    I32(Array<i32>),
    U64(Array<u64>),
    I64(Array<i64>),
    F32(Array<f32>),
    F64(Array<f64>),
    Str(Array<String>),
}

macro_rules! with_array {
    ($any:expr, $array:ident => $body:expr) => {
        match $any {
            AnyArray::U8($array) => $body,
            AnyArray::I8($array) => $body,
            AnyArray::U16($array) => $body,
            AnyArray::I16($array) => $body,
            AnyArray::U32($array) => $body,
            AnyArray::I32($array) => $body,
            AnyArray::U64($array) => $body,
            AnyArray::I64($array) => $body,
            AnyArray::F32($array) => $body,
            AnyArray::F64($array) => $body,
            AnyArray::Str($array) => $body,
        }
    };
}

impl AnyArray {
    /// Decode a payload, dispatching on the header's type word.
    pub fn decode(header: &EncodedArray, data: &[u8]) -> Result<Self> {
        Ok(match header.element_kind()? {
            ElementKind::U8 => Self::U8(Array::decode_data(header, data)?),
            ElementKind::I8 => Self::I8(Array::decode_data(header, data)?),
            ElementKind::U16 => Self::U16(Array::decode_data(header, data)?),
            ElementKind::I16 => Self::I16(Array::decode_data(header, data)?),
            ElementKind::U32 => Self::U32(Array::decode_data(header, data)?),
            ElementKind::I32 => Self::I32(Array::decode_data(header, data)?),
            ElementKind::U64 => Self::U64(Array::decode_data(header, data)?),
            ElementKind::I64 => Self::I64(Array::decode_data(header, data)?),
            ElementKind::F32 => Self::F32(Array::decode_data(header, data)?),
            ElementKind::F64 => Self::F64(Array::decode_data(header, data)?),
            ElementKind::Str => Self::Str(Array::decode_data(header, data)?),
        })
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::U8(_) => ElementKind::U8,
            Self::I8(_) => ElementKind::I8,
            Self::U16(_) => ElementKind::U16,
            Self::I16(_) => ElementKind::I16,
            Self::U32(_) => ElementKind::U32,
            Self::I32(_) => ElementKind::I32,
            Self::U64(_) => ElementKind::U64,
            Self::I64(_) => ElementKind::I64,
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
            Self::Str(_) => ElementKind::Str,
        }
    }

    /// Rows.
    pub fn height(&self) -> usize {
        with_array!(self, a => a.height())
    }

    /// Columns.
    pub fn width(&self) -> usize {
        with_array!(self, a => a.width())
    }

    /// Encoded bytes per row.
    pub fn stride(&self) -> usize {
        with_array!(self, a => a.stride())
    }

    /// Buffer flags.
    pub fn flags(&self) -> BufferFlags {
        with_array!(self, a => a.flags())
    }

    /// The header describing this array.
    pub fn encoded_header(&self) -> Result<EncodedArray> {
        with_array!(self, a => a.encoded_header())
    }

    /// Unwrap into a typed array.
    pub fn downcast<T: Element>(self) -> Result<Array<T>> {
        T::from_any(self)
    }
}

impl<T: Element> From<Array<T>> for AnyArray {
    fn from(array: Array<T>) -> Self {
        T::into_any(array)
    }
}

impl fmt::Display for AnyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} (stride {})",
            self.height(),
            self.width(),
            self.kind(),
            self.stride()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Element>(array: &Array<T>) -> (EncodedArray, Vec<u8>) {
        let mut data = vec![0xEEu8; array.encoded_data_len()];
        array.encode_data(&mut data);
        (array.encoded_header().unwrap(), data)
    }

    #[test]
    fn rows_are_padded_to_stride() {
        let array = Array::from_vec(2, 3, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let (header, data) = encode(&array);
        assert_eq!(header.stride, 16);
        assert_eq!(data.len(), 32);
        assert_eq!(&data[..4], &[1, 2, 3, 0]);
        assert_eq!(&data[16..19], &[4, 5, 6]);
        assert!(data[19..].iter().all(|&b| b == 0));
    }

    #[test]
    fn decode_restores_typed_array() {
        let array = Array::from_vec(3, 4, (0..12).map(|v| v as f32 * 0.5).collect()).unwrap();
        let (header, data) = encode(&array);
        let any = AnyArray::decode(&header, &data).unwrap();
        assert_eq!(any.kind(), ElementKind::F32);
        assert_eq!(any.downcast::<f32>().unwrap(), array);
    }

    #[test]
    fn one_by_zero_array_keeps_minimum_stride() {
        let array: Array<i64> = Array::new(1, 0);
        let (header, data) = encode(&array);
        assert_eq!(header.count, 0);
        assert_eq!(header.stride, 16);
        assert_eq!(data.len(), 16);
        let back = Array::<i64>::decode_data(&header, &data).unwrap();
        assert_eq!((back.height(), back.width()), (1, 0));
    }

    #[test]
    fn string_array_is_packed() {
        let words = vec!["a".to_string(), String::new(), "xyz".to_string(), "q".to_string()];
        let array = Array::from_vec(2, 2, words).unwrap();
        let (header, data) = encode(&array);
        assert_eq!(header.stride, 0);
        assert_eq!(data, b"a\0\0xyz\0q\0");
        assert_eq!(Array::<String>::decode_data(&header, &data).unwrap(), array);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let array = Array::from_vec(1, 2, vec![1u16, 2]).unwrap();
        let (header, data) = encode(&array);
        assert!(matches!(
            Array::<i16>::decode_data(&header, &data),
            Err(BinstackError::UnsupportedType { .. })
        ));
        let any = AnyArray::decode(&header, &data).unwrap();
        assert!(any.downcast::<u32>().is_err());
    }

    #[test]
    fn truncated_payload_is_short_buffer() {
        let array = Array::from_vec(2, 2, vec![1u32, 2, 3, 4]).unwrap();
        let (header, data) = encode(&array);
        assert!(matches!(
            Array::<u32>::decode_data(&header, &data[..20]),
            Err(BinstackError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn oversized_string_header_fails_before_allocating() {
        let array = Array::from_vec(1, 2, vec!["a".to_string(), "b".to_string()]).unwrap();
        let (mut header, data) = encode(&array);
        header.height = 65536;
        header.width = 65535;
        header.count = 65536 * 65535;

        assert!(matches!(
            Array::<String>::decode_data(&header, &data),
            Err(BinstackError::OutOfMemory { requested: 4_294_901_760, available: 4 })
        ));
        assert!(AnyArray::decode(&header, &data).is_err());
    }

    #[test]
    fn oversized_numeric_header_fails_before_allocating() {
        let array = Array::from_vec(1, 1, vec![7u32]).unwrap();
        let (mut header, data) = encode(&array);
        header.height = 60000;
        header.width = 60000;
        header.count = 60000 * 60000;
        header.stride = 240_000;

        assert!(matches!(
            AnyArray::decode(&header, &data),
            Err(BinstackError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn from_vec_checks_shape() {
        assert!(Array::from_vec(2, 2, vec![0u8; 3]).is_err());
    }

    #[test]
    fn element_access() {
        let mut array: Array<i32> = Array::new(2, 3);
        *array.get_mut(1, 2).unwrap() = 9;
        assert_eq!(array.get(1, 2), Some(&9));
        assert_eq!(array.get(2, 0), None);
        assert_eq!(array.row(1).unwrap(), &[0, 0, 9]);
    }

    #[test]
    fn buffer_flags() {
        let flags = BufferFlags::FULLY_ALLOCATED.union(BufferFlags::GUARDED);
        assert!(flags.contains(BufferFlags::GUARDED));
        assert!(!flags.contains(BufferFlags::ZERO_ALLOCATED));
    }
}
