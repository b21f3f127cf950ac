//! Fixed-size headers that precede typed payloads.
//!
//! All headers are sequences of little-endian 32-bit words:
//!
//! | header                     | words | bytes |
//! |----------------------------|-------|-------|
//! | [`EncodedBasicTypeBuffer`] | 2     | 8     |
//! | [`EncodedArray`]           | 6     | 24    |
//! | [`EncodedArraySlice`]      | 12    | 48    |
//! | [`EncodedBinaryImage`]     | 3     | 12    |
//!
//! Each header offers `read_from`, which advances the caller's slice past
//! the header, and `parse`, which leaves it alone. Handing either fewer
//! bytes than the header size is an [`BinstackError::OutOfMemory`].

use super::array::BufferFlags;
use super::element::ElementKind;
use super::slice::LinearSequence;
use crate::error::{BinstackError, Result};
use byteorder::{ByteOrder, LittleEndian};

const IS_BASIC_TYPE: u32 = 1 << 0;
const IS_INTEGER: u32 = 1 << 1;
const IS_SIGNED: u32 = 1 << 2;
const IS_FLOAT: u32 = 1 << 3;
const IS_STRING: u32 = 1 << 4;
const BYTE_SIZE_SHIFT: u32 = 16;

/// The type word: kind bits in the low half, element size in the high half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeFlags(u32);

impl TypeFlags {
    /// Wrap a raw type word.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub(crate) const fn integer(signed: bool, byte_size: u32) -> Self {
        let signed = if signed { IS_SIGNED } else { 0 };
        Self(IS_BASIC_TYPE | IS_INTEGER | signed | (byte_size << BYTE_SIZE_SHIFT))
    }

    pub(crate) const fn float(byte_size: u32) -> Self {
        Self(IS_BASIC_TYPE | IS_SIGNED | IS_FLOAT | (byte_size << BYTE_SIZE_SHIFT))
    }

    pub(crate) const fn string() -> Self {
        Self(IS_STRING)
    }

    /// The raw type word.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Fixed-size numeric element.
    pub const fn is_basic_type(&self) -> bool {
        self.0 & IS_BASIC_TYPE != 0
    }

    /// Integer element.
    pub const fn is_integer(&self) -> bool {
        self.0 & IS_INTEGER != 0
    }

    /// Signed element (integers and floats).
    pub const fn is_signed(&self) -> bool {
        self.0 & IS_SIGNED != 0
    }

    /// Floating-point element.
    pub const fn is_float(&self) -> bool {
        self.0 & IS_FLOAT != 0
    }

    /// String element.
    pub const fn is_string(&self) -> bool {
        self.0 & IS_STRING != 0
    }

    /// Size of one element in bytes.
    pub const fn byte_size(&self) -> usize {
        (self.0 >> BYTE_SIZE_SHIFT) as usize
    }
}

fn take_words<const N: usize>(input: &mut &[u8]) -> Result<[u32; N]> {
    let len = N * 4;
    if input.len() < len {
        return Err(BinstackError::short_buffer(len, input.len()));
    }
    let (head, rest) = input.split_at(len);
    let mut words = [0u32; N];
    LittleEndian::read_u32_into(head, &mut words);
    *input = rest;
    Ok(words)
}

fn put_words(words: &[u32], out: &mut [u8]) -> Result<usize> {
    let len = words.len() * 4;
    if out.len() < len {
        return Err(BinstackError::short_buffer(len, out.len()));
    }
    LittleEndian::write_u32_into(words, &mut out[..len]);
    Ok(len)
}

fn to_u32(name: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| BinstackError::InvalidParameter {
        name,
        cause: format!("{} does not fit in 32 bits", value),
    })
}

/// Header of a 1-D buffer of basic values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedBasicTypeBuffer {
    /// Element type.
    pub flags: TypeFlags,
    /// Number of elements that follow.
    pub count: u32,
}

impl EncodedBasicTypeBuffer {
    /// Encoded size.
    pub const LEN: usize = 8;

    /// Header for `count` elements of `kind`.
    pub fn new(kind: ElementKind, count: usize) -> Result<Self> {
        Ok(Self {
            flags: kind.flags(),
            count: to_u32("count", count)?,
        })
    }

    /// Decode and advance `input`.
    pub fn read_from(input: &mut &[u8]) -> Result<Self> {
        let [flags, count] = take_words::<2>(input)?;
        Ok(Self {
            flags: TypeFlags::from_bits(flags),
            count,
        })
    }

    /// Decode without advancing.
    pub fn parse(mut bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut bytes)
    }

    /// Encode into the front of `out`, returning the bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize> {
        put_words(&[self.flags.bits(), self.count], out)
    }

    /// The element kind.
    pub fn element_kind(&self) -> Result<ElementKind> {
        ElementKind::from_flags(self.flags)
    }
}

/// Header of a 2-D array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedArray {
    /// Element type.
    pub flags: TypeFlags,
    /// `height * width`.
    pub count: u32,
    /// Rows.
    pub height: u32,
    /// Columns.
    pub width: u32,
    /// Bytes per row in the payload; 0 for packed strings.
    pub stride: u32,
    /// Buffer flags of the source array.
    pub buffer_flags: BufferFlags,
}

impl EncodedArray {
    /// Encoded size.
    pub const LEN: usize = 24;

    /// Decode and advance `input`.
    pub fn read_from(input: &mut &[u8]) -> Result<Self> {
        let [flags, count, height, width, stride, buffer_flags] = take_words::<6>(input)?;
        Ok(Self {
            flags: TypeFlags::from_bits(flags),
            count,
            height,
            width,
            stride,
            buffer_flags: BufferFlags::from_bits(buffer_flags),
        })
    }

    /// Decode without advancing.
    pub fn parse(mut bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut bytes)
    }

    /// Encode into the front of `out`, returning the bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize> {
        put_words(&self.words(), out)
    }

    fn words(&self) -> [u32; 6] {
        [
            self.flags.bits(),
            self.count,
            self.height,
            self.width,
            self.stride,
            self.buffer_flags.bits(),
        ]
    }

    /// The element kind.
    pub fn element_kind(&self) -> Result<ElementKind> {
        ElementKind::from_flags(self.flags)
    }
}

/// Header of an array slice: the underlying array plus one linear
/// sequence per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedArraySlice {
    /// Header of the underlying array.
    pub array: EncodedArray,
    /// Row selection.
    pub y: LinearSequence,
    /// Column selection.
    pub x: LinearSequence,
}

impl EncodedArraySlice {
    /// Encoded size.
    pub const LEN: usize = 48;

    /// Decode and advance `input`.
    pub fn read_from(input: &mut &[u8]) -> Result<Self> {
        if input.len() < Self::LEN {
            return Err(BinstackError::short_buffer(Self::LEN, input.len()));
        }
        let array = EncodedArray::read_from(input)?;
        let [ys, yi, yn, xs, xi, xn] = take_words::<6>(input)?;
        Ok(Self {
            array,
            y: LinearSequence::new(ys as i32, yi as i32, yn as i32),
            x: LinearSequence::new(xs as i32, xi as i32, xn as i32),
        })
    }

    /// Decode without advancing.
    pub fn parse(mut bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut bytes)
    }

    /// Encode into the front of `out`, returning the bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize> {
        if out.len() < Self::LEN {
            return Err(BinstackError::short_buffer(Self::LEN, out.len()));
        }
        let written = self.array.write_to(out)?;
        let (y, x) = (self.y, self.x);
        let words = [
            y.start() as u32,
            y.increment() as u32,
            y.size() as u32,
            x.start() as u32,
            x.increment() as u32,
            x.size() as u32,
        ];
        Ok(written + put_words(&words, &mut out[written..])?)
    }
}

/// Header of a run-length encoded binary image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedBinaryImage {
    /// Rows.
    pub height: u32,
    /// Columns.
    pub width: u32,
    /// Bytes of RLE data that follow.
    pub compressed_len: u32,
}

impl EncodedBinaryImage {
    /// Encoded size.
    pub const LEN: usize = 12;

    /// Header for an image of the given shape.
    pub fn new(height: usize, width: usize, compressed_len: usize) -> Result<Self> {
        Ok(Self {
            height: to_u32("height", height)?,
            width: to_u32("width", width)?,
            compressed_len: to_u32("compressed_len", compressed_len)?,
        })
    }

    /// Decode and advance `input`.
    pub fn read_from(input: &mut &[u8]) -> Result<Self> {
        let [height, width, compressed_len] = take_words::<3>(input)?;
        Ok(Self {
            height,
            width,
            compressed_len,
        })
    }

    /// Encode into the front of `out`, returning the bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize> {
        put_words(&[self.height, self.width, self.compressed_len], out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_array() -> EncodedArray {
        EncodedArray {
            flags: ElementKind::I16.flags(),
            count: 12,
            height: 3,
            width: 4,
            stride: 16,
            buffer_flags: BufferFlags::FULLY_ALLOCATED,
        }
    }

    #[test]
    fn type_word_layout() {
        let flags = ElementKind::I32.flags();
        assert_eq!(flags.bits(), 0b111 | (4 << 16));
        assert!(flags.is_integer() && flags.is_signed() && !flags.is_float());
        assert_eq!(flags.byte_size(), 4);

        let flags = ElementKind::Str.flags();
        assert!(flags.is_string() && !flags.is_basic_type());
    }

    #[test]
    fn read_from_advances_parse_does_not() {
        let header = sample_array();
        let mut bytes = vec![0u8; EncodedArray::LEN + 3];
        header.write_to(&mut bytes).unwrap();

        assert_eq!(EncodedArray::parse(&bytes).unwrap(), header);

        let mut input = &bytes[..];
        assert_eq!(EncodedArray::read_from(&mut input).unwrap(), header);
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn short_input_is_out_of_memory() {
        let bytes = [0u8; EncodedArray::LEN - 1];
        let mut input = &bytes[..];
        assert!(matches!(
            EncodedArray::read_from(&mut input),
            Err(BinstackError::OutOfMemory {
                requested: 24,
                available: 23
            })
        ));
        assert_eq!(input.len(), EncodedArray::LEN - 1);
    }

    #[test]
    fn slice_header_keeps_signed_words() {
        let header = EncodedArraySlice {
            array: sample_array(),
            y: LinearSequence::new(2, -1, 3),
            x: LinearSequence::new(0, 2, 2),
        };
        let mut bytes = [0u8; EncodedArraySlice::LEN];
        assert_eq!(header.write_to(&mut bytes).unwrap(), 48);
        assert_eq!(EncodedArraySlice::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn basic_type_header() {
        let header = EncodedBasicTypeBuffer::new(ElementKind::F64, 5).unwrap();
        let mut bytes = [0u8; 8];
        header.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[4..], &5u32.to_le_bytes());
        assert_eq!(
            EncodedBasicTypeBuffer::parse(&bytes).unwrap().element_kind().unwrap(),
            ElementKind::F64
        );
    }
}
