//! Reading records back out of a stack.

use super::array::{AnyArray, Array};
use super::buffer::{DESCRIPTION_STRING_LENGTH, RECORD_PREFIX_LEN};
use super::element::Element;
use super::encoded::{EncodedArray, EncodedArraySlice, EncodedBasicTypeBuffer, EncodedBinaryImage};
use super::record_type;
use super::slice::ArraySlice;
use crate::error::{BinstackError, Result};
use crate::rle;
use crate::stack::{ReconstructingIter, RecoveredSegment, StackIter};
use crate::types::{Segment, StackOffset};

/// One record: description strings plus payload.
///
/// The payload runs to the end of the segment, so it may carry up to 15
/// bytes of alignment padding past what the writer stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    offset: StackOffset,
    type_name: &'a str,
    object_name: &'a str,
    payload: &'a [u8],
}

fn read_description(field: &[u8], offset: usize) -> Result<&str> {
    let field = &field[..DESCRIPTION_STRING_LENGTH];
    let end = field.iter().position(|&b| b == 0).ok_or_else(|| {
        BinstackError::corruption(offset, "description string is not NUL-terminated")
    })?;
    std::str::from_utf8(&field[..end]).map_err(|e| {
        BinstackError::corruption(offset, format!("description string is not UTF-8: {}", e))
    })
}

impl<'a> Record<'a> {
    /// Split the bytes of a segment at `offset` into a record.
    pub fn parse(offset: StackOffset, bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < RECORD_PREFIX_LEN {
            return Err(BinstackError::corruption(
                offset.as_usize(),
                format!(
                    "segment of {} bytes cannot hold description strings",
                    bytes.len()
                ),
            ));
        }

        let (names, payload) = bytes.split_at(RECORD_PREFIX_LEN);
        Ok(Self {
            offset,
            type_name: read_description(names, offset.as_usize())?,
            object_name: read_description(
                &names[DESCRIPTION_STRING_LENGTH..],
                offset.as_usize() + DESCRIPTION_STRING_LENGTH,
            )?,
            payload,
        })
    }

    /// Offset of the segment holding this record.
    pub fn offset(&self) -> StackOffset {
        self.offset
    }

    /// The type tag, e.g. `"Array"`.
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// The name the writer gave the object.
    pub fn object_name(&self) -> &'a str {
        self.object_name
    }

    /// Bytes after the description strings.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    fn expect_type(&self, expected: &str) -> Result<()> {
        if self.type_name != expected {
            return Err(BinstackError::UnsupportedType {
                cause: format!(
                    "record '{}' has type '{}', expected '{}'",
                    self.object_name, self.type_name, expected
                ),
            });
        }
        Ok(())
    }

    /// The text of a `"String"` record.
    pub fn as_string(&self) -> Result<&'a str> {
        self.expect_type(record_type::STRING)?;
        let payload: &'a [u8] = self.payload;
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        std::str::from_utf8(&payload[..end]).map_err(|e| BinstackError::Format {
            cause: format!("string record is not UTF-8: {}", e),
        })
    }

    /// The header of an `"Array"` record.
    pub fn array_header(&self) -> Result<EncodedArray> {
        self.expect_type(record_type::ARRAY)?;
        EncodedArray::parse(self.payload)
    }

    /// Decode an `"Array"` record of whatever element kind it holds.
    pub fn decode_array(&self) -> Result<AnyArray> {
        self.expect_type(record_type::ARRAY)?;
        let mut payload = self.payload;
        let header = EncodedArray::read_from(&mut payload)?;
        AnyArray::decode(&header, payload)
    }

    /// Decode an `"Array"` record of a known element type.
    pub fn decode_array_as<T: Element>(&self) -> Result<Array<T>> {
        self.expect_type(record_type::ARRAY)?;
        let mut payload = self.payload;
        let header = EncodedArray::read_from(&mut payload)?;
        Array::decode_data(&header, payload)
    }

    /// Decode a `"BasicType"` record.
    pub fn decode_basic_type<T: Element>(&self) -> Result<Vec<T>> {
        self.expect_type(record_type::BASIC_TYPE)?;
        let mut payload = self.payload;
        let header = EncodedBasicTypeBuffer::read_from(&mut payload)?;
        let kind = header.element_kind()?;
        if kind != T::KIND {
            return Err(BinstackError::UnsupportedType {
                cause: format!("expected {} values, found {}", T::KIND, kind),
            });
        }
        (0..header.count).map(|_| T::decode(&mut payload)).collect()
    }

    /// Decode an `"ArraySlice"` record.
    pub fn decode_array_slice<T: Element>(&self) -> Result<ArraySlice<T>> {
        self.expect_type(record_type::ARRAY_SLICE)?;
        let mut payload = self.payload;
        let header = EncodedArraySlice::read_from(&mut payload)?;
        let array = Array::decode_data(&header.array, payload)?;
        ArraySlice::new(array, header.y, header.x)
    }

    /// Decode a `"BinaryImageRLE"` record into a 0/1 image.
    pub fn decode_binary_image(&self) -> Result<Array<u8>> {
        self.expect_type(record_type::BINARY_IMAGE)?;
        let mut payload = self.payload;
        let header = EncodedBinaryImage::read_from(&mut payload)?;

        let compressed_len = header.compressed_len as usize;
        let compressed = payload
            .get(..compressed_len)
            .ok_or_else(|| BinstackError::short_buffer(compressed_len, payload.len()))?;

        let (height, width) = (header.height as usize, header.width as usize);
        let decoded = rle::decoded_len(compressed);
        if height.checked_mul(width) != Some(decoded) {
            return Err(BinstackError::Format {
                cause: format!(
                    "RLE data decodes to {} pixels, image is {}x{}",
                    decoded, height, width
                ),
            });
        }

        let mut pixels = vec![0u8; decoded];
        rle::decode_run_length_binary(compressed, &mut pixels)?;
        Array::from_vec(height, width, pixels)
    }
}

/// Records in stack order, stopping at the first damaged segment.
#[derive(Debug, Clone)]
pub struct RecordIter<'a> {
    inner: StackIter<'a>,
}

impl<'a> RecordIter<'a> {
    /// Wrap a strict segment iterator.
    pub fn new(inner: StackIter<'a>) -> Self {
        Self { inner }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let segment = match self.inner.next()? {
            Ok(segment) => segment,
            Err(e) => return Some(Err(e)),
        };
        let bytes = self.inner.bytes(segment).ok_or_else(|| {
            BinstackError::corruption(segment.offset().as_usize(), "segment outside buffer")
        });
        Some(bytes.and_then(|bytes| Record::parse(segment.offset(), bytes)))
    }
}

/// Which length bounds a recovered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Trust the guard words: the payload ends where the END guard sits.
    #[default]
    PreferRecovered,
    /// Trust the header's length word when it stays inside the buffer,
    /// falling back to the guard-bounded length otherwise.
    PreferReported,
}

/// A record found by scanning for guard words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredRecord<'a> {
    segment: RecoveredSegment,
    record: Record<'a>,
}

impl<'a> RecoveredRecord<'a> {
    /// The decoded record.
    pub fn record(&self) -> &Record<'a> {
        &self.record
    }

    /// Take the record.
    pub fn into_record(self) -> Record<'a> {
        self.record
    }

    /// Length stored in the segment header.
    pub fn reported_len(&self) -> usize {
        self.segment.reported_len()
    }

    /// Length bounded by the guard words.
    pub fn recovered_len(&self) -> usize {
        self.segment.recovered_len()
    }

    /// True if both lengths agree.
    pub fn lengths_agree(&self) -> bool {
        self.segment.lengths_agree()
    }
}

/// Records recovered by scanning for guard words.
///
/// A segment too short or too garbled to hold description strings is
/// yielded as an error and scanning continues with the next one.
#[derive(Debug, Clone)]
pub struct ReconstructingRecordIter<'a> {
    inner: ReconstructingIter<'a>,
    policy: RecoveryPolicy,
}

impl<'a> ReconstructingRecordIter<'a> {
    /// Wrap a reconstructing segment iterator.
    pub fn new(inner: ReconstructingIter<'a>, policy: RecoveryPolicy) -> Self {
        Self { inner, policy }
    }

    fn choose(&self, found: &RecoveredSegment) -> Segment {
        match self.policy {
            RecoveryPolicy::PreferRecovered => found.recovered(),
            RecoveryPolicy::PreferReported => {
                let reported = found.reported();
                if !reported.is_empty() && self.inner.bytes(reported).is_some() {
                    reported
                } else {
                    found.recovered()
                }
            }
        }
    }
}

impl<'a> Iterator for ReconstructingRecordIter<'a> {
    type Item = Result<RecoveredRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = self.inner.next()?;
        let chosen = self.choose(&found);

        let result = self
            .inner
            .bytes(chosen)
            .ok_or_else(|| {
                BinstackError::corruption(chosen.offset().as_usize(), "segment outside buffer")
            })
            .and_then(|bytes| Record::parse(chosen.offset(), bytes))
            .map(|record| RecoveredRecord {
                segment: found,
                record,
            });

        if let Err(e) = &result {
            tracing::warn!(
                offset = chosen.offset().as_usize(),
                error = %e,
                "Recovered segment does not hold a record"
            );
        }
        Some(result)
    }
}
