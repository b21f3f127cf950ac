//! Tagged records on top of a [`MemoryStack`].

use super::array::Array;
use super::element::Element;
use super::encoded::{EncodedArray, EncodedArraySlice, EncodedBasicTypeBuffer, EncodedBinaryImage};
use super::framing::{self, find_serialized_buffer};
use super::record::{ReconstructingRecordIter, RecordIter, RecoveryPolicy};
use super::record_type;
use super::slice::ArraySlice;
use crate::error::{BinstackError, Result};
use crate::rle;
use crate::stack::{MemoryStack, StackConfig, StackView};
use crate::types::Segment;

/// Width of each description string field, terminator included.
pub const DESCRIPTION_STRING_LENGTH: usize = 32;

/// Longest text [`SerializedBuffer::push_back_string`] stores.
pub const MAX_STRING_LENGTH: usize = 1024;

/// Bytes of description strings in front of every record payload.
pub const RECORD_PREFIX_LEN: usize = 2 * DESCRIPTION_STRING_LENGTH;

fn truncate_at_boundary(text: &str, max: usize) -> &str {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn write_description(field: &mut [u8], text: &str) {
    let text = truncate_at_boundary(text, DESCRIPTION_STRING_LENGTH - 1);
    let field = &mut field[..DESCRIPTION_STRING_LENGTH];
    field.fill(0);
    field[..text.len()].copy_from_slice(text.as_bytes());
}

/// A sequence of records, each tagged with a type name and an object name.
///
/// ```
/// use binstack_core::serialize::{Array, SerializedBuffer};
///
/// let mut region = vec![0u8; 4096];
/// let mut buffer = SerializedBuffer::new(&mut region);
///
/// buffer.push_back_string("calibration").unwrap();
/// let grid = Array::from_vec(2, 2, vec![1i16, -2, 3, -4]).unwrap();
/// buffer.push_back_array("grid", &grid).unwrap();
///
/// let records: Vec<_> = buffer.records().map(|r| r.unwrap()).collect();
/// assert_eq!(records[0].as_string().unwrap(), "calibration");
/// assert_eq!(records[1].decode_array_as::<i16>().unwrap(), grid);
/// ```
pub struct SerializedBuffer<'a> {
    stack: MemoryStack<'a>,
}

impl<'a> SerializedBuffer<'a> {
    /// Build records in `buffer` with guard words on.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self::with_config(buffer, StackConfig::default())
    }

    /// Build records with an explicit stack configuration.
    pub fn with_config(buffer: &'a mut [u8], config: StackConfig) -> Self {
        Self {
            stack: MemoryStack::with_config(buffer, config),
        }
    }

    /// The underlying stack.
    pub fn stack(&self) -> &MemoryStack<'a> {
        &self.stack
    }

    /// The underlying stack, mutably.
    pub fn stack_mut(&mut self) -> &mut MemoryStack<'a> {
        &mut self.stack
    }

    /// Allocate a record and write its description strings.
    ///
    /// Returns the payload segment, `data_len` bytes just past the strings.
    pub fn allocate(
        &mut self,
        type_name: &str,
        object_name: &str,
        data_len: usize,
    ) -> Result<Segment> {
        let total = data_len
            .checked_add(RECORD_PREFIX_LEN)
            .ok_or_else(|| BinstackError::InvalidParameter {
                name: "data_len",
                cause: format!("{} overflows", data_len),
            })?;
        let segment = self.stack.allocate(total)?;
        self.write_description_strings(segment, type_name, object_name)
    }

    /// Allocate a segment with no description strings.
    ///
    /// The caller is responsible for laying out the record, normally through
    /// [`write_description_strings`](Self::write_description_strings).
    pub fn allocate_raw(&mut self, data_len: usize) -> Result<Segment> {
        self.stack.allocate(data_len)
    }

    /// Write both description strings at the front of `segment` and return
    /// the remainder.
    ///
    /// Names longer than 31 bytes are truncated on a character boundary.
    pub fn write_description_strings(
        &mut self,
        segment: Segment,
        type_name: &str,
        object_name: &str,
    ) -> Result<Segment> {
        let payload = segment
            .len()
            .checked_sub(RECORD_PREFIX_LEN)
            .and_then(|len| segment.sub(RECORD_PREFIX_LEN, len))
            .ok_or_else(|| BinstackError::InvalidParameter {
                name: "segment",
                cause: format!("{} is too short for description strings", segment),
            })?;

        let bytes = self.stack.bytes_mut(segment)?;
        write_description(&mut bytes[..DESCRIPTION_STRING_LENGTH], type_name);
        write_description(&mut bytes[DESCRIPTION_STRING_LENGTH..], object_name);
        Ok(payload)
    }

    /// Mutable bytes of a segment handed out by this buffer.
    pub fn bytes_mut(&mut self, segment: Segment) -> Result<&mut [u8]> {
        self.stack.bytes_mut(segment)
    }

    /// Store a NUL-terminated string of at most [`MAX_STRING_LENGTH`] bytes.
    pub fn push_back_string(&mut self, text: &str) -> Result<Segment> {
        let text = truncate_at_boundary(text, MAX_STRING_LENGTH);
        let payload = self.allocate(record_type::STRING, record_type::STRING, text.len() + 1)?;
        let bytes = self.stack.bytes_mut(payload)?;
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        bytes[text.len()] = 0;
        Ok(payload)
    }

    /// Store opaque bytes.
    pub fn push_back_raw(&mut self, object_name: &str, data: &[u8]) -> Result<Segment> {
        let payload = self.allocate(record_type::RAW, object_name, data.len())?;
        self.stack.bytes_mut(payload)?.copy_from_slice(data);
        Ok(payload)
    }

    /// Store a 1-D buffer of values behind an [`EncodedBasicTypeBuffer`].
    pub fn push_back_basic_type<T: Element>(
        &mut self,
        object_name: &str,
        values: &[T],
    ) -> Result<Segment> {
        let header = EncodedBasicTypeBuffer::new(T::KIND, values.len())?;
        let data_len: usize = values.iter().map(Element::encoded_len).sum();
        let payload = self.allocate(
            record_type::BASIC_TYPE,
            object_name,
            EncodedBasicTypeBuffer::LEN + data_len,
        )?;

        let bytes = self.stack.bytes_mut(payload)?;
        let mut at = header.write_to(bytes)?;
        for value in values {
            value.encode(&mut bytes[at..]);
            at += value.encoded_len();
        }
        Ok(payload)
    }

    /// Store an array behind an [`EncodedArray`] header.
    pub fn push_back_array<T: Element>(
        &mut self,
        object_name: &str,
        array: &Array<T>,
    ) -> Result<Segment> {
        let header = array.encoded_header()?;
        let data_len = array.encoded_data_len();
        let payload = self.allocate(record_type::ARRAY, object_name, EncodedArray::LEN + data_len)?;

        let bytes = self.stack.bytes_mut(payload)?;
        let at = header.write_to(bytes)?;
        array.encode_data(&mut bytes[at..at + data_len]);
        Ok(payload)
    }

    /// Store a slice: its [`EncodedArraySlice`] header, then the whole
    /// underlying array.
    pub fn push_back_array_slice<T: Element>(
        &mut self,
        object_name: &str,
        slice: &ArraySlice<T>,
    ) -> Result<Segment> {
        let header = slice.encoded_header()?;
        let data_len = slice.array().encoded_data_len();
        let payload = self.allocate(
            record_type::ARRAY_SLICE,
            object_name,
            EncodedArraySlice::LEN + data_len,
        )?;

        let bytes = self.stack.bytes_mut(payload)?;
        let at = header.write_to(bytes)?;
        slice.array().encode_data(&mut bytes[at..at + data_len]);
        Ok(payload)
    }

    /// Store a binary image run-length encoded.
    ///
    /// The record is allocated for the worst case and then shrunk to the
    /// encoded size.
    pub fn push_back_binary_image(
        &mut self,
        object_name: &str,
        image: &Array<u8>,
    ) -> Result<Segment> {
        let pixels = image.as_slice();
        let body = RECORD_PREFIX_LEN + EncodedBinaryImage::LEN;

        let mut top = self.stack.allocate_top(body + pixels.len())?;
        let bytes = top.bytes_mut();
        write_description(&mut bytes[..DESCRIPTION_STRING_LENGTH], record_type::BINARY_IMAGE);
        write_description(&mut bytes[DESCRIPTION_STRING_LENGTH..], object_name);

        let compressed_len = rle::encode_run_length_binary(pixels, &mut bytes[body..])?;
        EncodedBinaryImage::new(image.height(), image.width(), compressed_len)?
            .write_to(&mut bytes[RECORD_PREFIX_LEN..])?;

        let segment = top.resize(body + compressed_len)?.finish();
        tracing::trace!(
            stack = %self.stack.id(),
            pixels = pixels.len(),
            compressed_len,
            "Binary image encoded"
        );

        Ok(Segment::new(
            segment.offset().add(RECORD_PREFIX_LEN),
            segment.len() - RECORD_PREFIX_LEN,
        ))
    }

    /// Strict record iterator.
    pub fn records(&self) -> RecordIter<'_> {
        RecordIter::new(self.stack.iter())
    }

    /// Guard-scanning record iterator.
    pub fn reconstruct(&self, policy: RecoveryPolicy) -> ReconstructingRecordIter<'_> {
        ReconstructingRecordIter::new(self.stack.reconstruct(), policy)
    }

    /// Check the framing of every record.
    pub fn is_valid(&self) -> bool {
        self.stack.is_valid()
    }

    /// `HEADER ‖ stack bytes ‖ FOOTER`, ready for a transport or a file.
    pub fn framed_bytes(&self) -> Vec<u8> {
        framing::frame(self.stack.as_bytes())
    }

    /// Read-only view of the records written so far.
    pub fn view(&self) -> SerializedView<'_> {
        SerializedView {
            stack: self.stack.view(),
        }
    }
}

/// Read-only records over bytes written by a [`SerializedBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct SerializedView<'a> {
    stack: StackView<'a>,
}

impl<'a> SerializedView<'a> {
    /// View unframed stack bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            stack: StackView::new(bytes),
        }
    }

    /// Locate the framed buffer inside `raw` and view it.
    pub fn find_in(raw: &'a [u8]) -> Result<Self> {
        let range = find_serialized_buffer(raw)?;
        tracing::debug!(start = range.start, end = range.end, "Serialized buffer located");
        Ok(Self::new(&raw[range]))
    }

    /// The stack view beneath.
    pub fn stack(&self) -> &StackView<'a> {
        &self.stack
    }

    /// Check the framing of every record.
    pub fn is_valid(&self) -> bool {
        self.stack.is_valid()
    }

    /// Strict record iterator.
    pub fn records(&self) -> RecordIter<'a> {
        RecordIter::new(self.stack.iter())
    }

    /// Guard-scanning record iterator.
    pub fn reconstruct(&self, policy: RecoveryPolicy) -> ReconstructingRecordIter<'a> {
        ReconstructingRecordIter::new(self.stack.reconstruct(), policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::LinearSequence;

    #[test]
    fn description_strings_are_truncated_and_terminated() {
        let mut region = vec![0u8; 1024];
        let mut buffer = SerializedBuffer::new(&mut region);
        let long = "x".repeat(50);
        buffer.push_back_raw(&long, &[1, 2, 3]).unwrap();

        let record = buffer.records().next().unwrap().unwrap();
        assert_eq!(record.type_name(), "Raw");
        assert_eq!(record.object_name().len(), DESCRIPTION_STRING_LENGTH - 1);
        assert_eq!(&record.payload()[..3], &[1, 2, 3]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let name = "é".repeat(20);
        let cut = truncate_at_boundary(&name, DESCRIPTION_STRING_LENGTH - 1);
        assert_eq!(cut.len(), 30);
    }

    #[test]
    fn long_string_is_capped() {
        let mut region = vec![0u8; 8192];
        let mut buffer = SerializedBuffer::new(&mut region);
        buffer.push_back_string(&"a".repeat(MAX_STRING_LENGTH + 100)).unwrap();

        let record = buffer.records().next().unwrap().unwrap();
        assert_eq!(record.type_name(), "String");
        assert_eq!(record.object_name(), "String");
        assert_eq!(record.as_string().unwrap().len(), MAX_STRING_LENGTH);
    }

    #[test]
    fn allocate_raw_then_describe() {
        let mut region = vec![0u8; 1024];
        let mut buffer = SerializedBuffer::new(&mut region);
        let segment = buffer.allocate_raw(RECORD_PREFIX_LEN + 4).unwrap();
        let payload = buffer
            .write_description_strings(segment, "Custom", "thing")
            .unwrap();
        buffer.bytes_mut(payload).unwrap().copy_from_slice(b"abcd");

        let record = buffer.records().next().unwrap().unwrap();
        assert_eq!(record.type_name(), "Custom");
        assert_eq!(&record.payload()[..4], b"abcd");
    }

    #[test]
    fn description_needs_room() {
        let mut region = vec![0u8; 1024];
        let mut buffer = SerializedBuffer::new(&mut region);
        let segment = buffer.allocate_raw(16).unwrap();
        assert!(buffer.write_description_strings(segment, "a", "b").is_err());
    }

    #[test]
    fn out_of_memory_propagates() {
        let mut region = vec![0u8; 128];
        let mut buffer = SerializedBuffer::new(&mut region);
        let big: Array<u8> = Array::new(10, 10);
        assert!(matches!(
            buffer.push_back_array("big", &big),
            Err(BinstackError::OutOfMemory { .. })
        ));
        assert!(buffer.is_valid());
    }

    #[test]
    fn binary_image_shrinks_to_encoded_size() {
        let mut region = vec![0u8; 4096];
        let mut buffer = SerializedBuffer::new(&mut region);
        let mut image: Array<u8> = Array::new(20, 30);
        for x in 0..30 {
            *image.get_mut(10, x).unwrap() = 1;
        }
        buffer.push_back_binary_image("mask", &image).unwrap();
        assert!(buffer.stack().used_bytes() < 600 + RECORD_PREFIX_LEN);

        let record = buffer.records().next().unwrap().unwrap();
        assert_eq!(record.decode_binary_image().unwrap(), image);
    }

    #[test]
    fn basic_type_and_slice_records() {
        let mut region = vec![0u8; 4096];
        let mut buffer = SerializedBuffer::new(&mut region);
        buffer.push_back_basic_type("gains", &[0.5f64, 1.5, -2.0]).unwrap();

        let grid = Array::from_vec(3, 3, (1..=9).collect::<Vec<u32>>()).unwrap();
        let slice = ArraySlice::new(grid, LinearSequence::new(0, 2, 2), LinearSequence::full(3)).unwrap();
        buffer.push_back_array_slice("corners", &slice).unwrap();

        let records: Vec<_> = buffer.records().map(|r| r.unwrap()).collect();
        assert_eq!(records[0].decode_basic_type::<f64>().unwrap(), vec![0.5, 1.5, -2.0]);
        let back = records[1].decode_array_slice::<u32>().unwrap();
        assert_eq!(back, slice);
        assert_eq!(back.materialize().unwrap().as_slice(), &[1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn framed_bytes_can_be_found_again() {
        let mut region = vec![0u8; 1024];
        let mut buffer = SerializedBuffer::new(&mut region);
        buffer.push_back_string("hello").unwrap();

        let mut raw = vec![0xAB; 13];
        raw.extend(buffer.framed_bytes());
        raw.extend_from_slice(&[0xCD; 5]);

        let view = SerializedView::find_in(&raw).unwrap();
        assert!(view.is_valid());
        let record = view.records().next().unwrap().unwrap();
        assert_eq!(record.as_string().unwrap(), "hello");
    }
}
