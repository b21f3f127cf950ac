//! Single-array binary files.
//!
//! # Layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Text header, 32 bytes                                         │
//! │   0..16  "BINSTACK-ARRAY01"                                   │
//! │   16     ' '                                                  │
//! │   17     'z' if compressed, ' ' otherwise                     │
//! │   18..32 compressor name, space padded                        │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Uncompressed: HEADER ‖ stack bytes ‖ FOOTER                   │
//! │ Compressed:   [original_len u32][compressed_len u32][stream]  │
//! │               where the stream expands to the line above      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stack holds exactly one `"Array"` record.

mod compress;
mod fs;

pub use compress::{Compressor, IdentityCompressor, MAX_COMPRESSION_LEVEL, ZlibCompressor};
pub use fs::{FsProvider, MockFs, RealFs};

use crate::error::{BinstackError, Result};
use crate::serialize::{
    AnyArray, Array, Element, EncodedArray, RECORD_PREFIX_LEN, RecoveryPolicy, SerializedBuffer,
    SerializedView, record_type,
};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;
use std::sync::Arc;

/// Length of the text header.
pub const ARRAY_FILE_HEADER_LENGTH: usize = 32;

/// Prefix every array file starts with.
pub const ARRAY_FILE_MAGIC: &[u8; 16] = b"BINSTACK-ARRAY01";

/// Flag byte marking a compressed payload.
pub const COMPRESSED_FLAG: u8 = b'z';

const FLAG_OFFSET: usize = ARRAY_FILE_MAGIC.len() + 1;
const NAME_OFFSET: usize = FLAG_OFFSET + 1;

// Guard words, header padding and alignment slack around the one record.
const STACK_OVERHEAD: usize = 64;

/// Options for [`ArrayFile::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// 0 stores the payload as is; 1..=9 compresses at that level.
    pub compression_level: u32,
    /// Object name written into the record.
    pub object_name: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compression_level: 0,
            object_name: record_type::ARRAY.to_string(),
        }
    }
}

impl SaveOptions {
    /// Set the compression level.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the record's object name.
    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    /// Check the options are in range.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(BinstackError::InvalidParameter {
                name: "compression_level",
                cause: format!(
                    "{} is outside 0..={}",
                    self.compression_level, MAX_COMPRESSION_LEVEL
                ),
            });
        }
        Ok(())
    }
}

/// The decoded text header of an array file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayFileHeader {
    /// Whether the payload is compressed.
    pub compressed: bool,
    /// Compressor name, empty when uncompressed.
    pub compressor: String,
}

impl ArrayFileHeader {
    /// Parse and validate the first [`ARRAY_FILE_HEADER_LENGTH`] bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ARRAY_FILE_HEADER_LENGTH {
            return Err(BinstackError::Format {
                cause: format!(
                    "file is {} bytes, header needs {}",
                    bytes.len(),
                    ARRAY_FILE_HEADER_LENGTH
                ),
            });
        }
        if &bytes[..ARRAY_FILE_MAGIC.len()] != ARRAY_FILE_MAGIC {
            return Err(BinstackError::Format {
                cause: format!(
                    "bad magic {:?}, expected {:?}",
                    String::from_utf8_lossy(&bytes[..ARRAY_FILE_MAGIC.len()]),
                    String::from_utf8_lossy(ARRAY_FILE_MAGIC)
                ),
            });
        }

        let compressed = match bytes[FLAG_OFFSET] {
            COMPRESSED_FLAG => true,
            b' ' => false,
            other => {
                return Err(BinstackError::Format {
                    cause: format!("unknown compression flag {:#04x}", other),
                });
            }
        };
        let compressor = String::from_utf8_lossy(&bytes[NAME_OFFSET..ARRAY_FILE_HEADER_LENGTH])
            .trim_end()
            .to_string();

        Ok(Self {
            compressed,
            compressor,
        })
    }

    fn to_bytes(&self) -> [u8; ARRAY_FILE_HEADER_LENGTH] {
        let mut bytes = [b' '; ARRAY_FILE_HEADER_LENGTH];
        bytes[..ARRAY_FILE_MAGIC.len()].copy_from_slice(ARRAY_FILE_MAGIC);
        if self.compressed {
            bytes[FLAG_OFFSET] = COMPRESSED_FLAG;
            let name = self.compressor.as_bytes();
            let len = name.len().min(ARRAY_FILE_HEADER_LENGTH - NAME_OFFSET);
            bytes[NAME_OFFSET..NAME_OFFSET + len].copy_from_slice(&name[..len]);
        }
        bytes
    }
}

/// Everything [`ArrayFile::inspect`] can learn from a file.
#[derive(Debug)]
pub struct ArrayFileContents {
    /// The text header.
    pub header: ArrayFileHeader,
    /// Bytes on disk.
    pub file_len: usize,
    /// Framed serialized buffer, decompressed if needed.
    pub framed: Vec<u8>,
}

impl ArrayFileContents {
    /// View the records inside the framed buffer.
    pub fn view(&self) -> Result<SerializedView<'_>> {
        SerializedView::find_in(&self.framed)
    }
}

/// Reads and writes array files through injected file system and
/// compressor capabilities.
///
/// ```
/// use binstack_core::file::{ArrayFile, IdentityCompressor, MockFs, SaveOptions};
/// use binstack_core::serialize::Array;
/// use std::sync::Arc;
///
/// let files = ArrayFile::new(Arc::new(MockFs::new()), Arc::new(IdentityCompressor));
/// let array = Array::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
///
/// files.save("/tmp/a.bin", &array, &SaveOptions::default()).unwrap();
/// assert_eq!(files.load::<f32>("/tmp/a.bin").unwrap(), array);
/// ```
#[derive(Clone)]
pub struct ArrayFile {
    fs: Arc<dyn FsProvider>,
    compressor: Arc<dyn Compressor>,
}

impl Default for ArrayFile {
    fn default() -> Self {
        Self::new(Arc::new(RealFs), Arc::new(ZlibCompressor))
    }
}

impl std::fmt::Debug for ArrayFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayFile")
            .field("mock_fs", &self.fs.is_mock())
            .field("compressor", &self.compressor.name())
            .finish()
    }
}

impl ArrayFile {
    /// Build with explicit capabilities.
    pub fn new(fs: Arc<dyn FsProvider>, compressor: Arc<dyn Compressor>) -> Self {
        Self { fs, compressor }
    }

    fn io_error(path: &Path, e: std::io::Error) -> BinstackError {
        BinstackError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        }
    }

    /// Write `array` to `path`.
    pub fn save<T: Element>(
        &self,
        path: impl AsRef<Path>,
        array: &Array<T>,
        options: &SaveOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        options.validate()?;

        let capacity = RECORD_PREFIX_LEN
            + EncodedArray::LEN
            + array.encoded_data_len()
            + STACK_OVERHEAD;
        let mut region = vec![0u8; capacity];
        let mut buffer = SerializedBuffer::new(&mut region);
        buffer.push_back_array(&options.object_name, array)?;
        let framed = buffer.framed_bytes();

        let compressed = options.compression_level > 0;
        let header = ArrayFileHeader {
            compressed,
            compressor: if compressed {
                self.compressor.name().to_string()
            } else {
                String::new()
            },
        };

        let mut out = header.to_bytes().to_vec();
        if compressed {
            let stream = self
                .compressor
                .compress(&framed, options.compression_level)?;
            let mut lens = [0u8; 8];
            LittleEndian::write_u32(&mut lens[..4], framed.len() as u32);
            LittleEndian::write_u32(&mut lens[4..], stream.len() as u32);
            out.extend_from_slice(&lens);
            out.extend_from_slice(&stream);
        } else {
            out.extend_from_slice(&framed);
        }

        self.fs
            .write(path, &out)
            .map_err(|e| Self::io_error(path, e))?;

        tracing::info!(
            path = %path.display(),
            height = array.height(),
            width = array.width(),
            kind = %T::KIND,
            bytes = out.len(),
            compressed,
            "Array file saved"
        );
        Ok(())
    }

    /// Read `path` and unwrap its framed serialized buffer.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<ArrayFileContents> {
        let path = path.as_ref();
        let bytes = self.fs.read(path).map_err(|e| Self::io_error(path, e))?;
        let header = ArrayFileHeader::parse(&bytes)?;
        let payload = &bytes[ARRAY_FILE_HEADER_LENGTH..];

        let framed = if header.compressed {
            if payload.len() < 8 {
                return Err(BinstackError::Format {
                    cause: format!(
                        "compressed payload of {} bytes has no length prefix",
                        payload.len()
                    ),
                });
            }
            let original_len = LittleEndian::read_u32(&payload[..4]) as usize;
            let compressed_len = LittleEndian::read_u32(&payload[4..8]) as usize;
            let stream = payload.get(8..8 + compressed_len).ok_or_else(|| {
                BinstackError::Format {
                    cause: format!(
                        "compressed stream truncated: header says {} bytes, file has {}",
                        compressed_len,
                        payload.len() - 8
                    ),
                }
            })?;

            if header.compressor != self.compressor.name() {
                tracing::debug!(
                    path = %path.display(),
                    written_by = %header.compressor,
                    reading_with = self.compressor.name(),
                    "Compressor name differs from file header"
                );
            }

            let framed = self.compressor.decompress(stream, original_len)?;
            if framed.len() != original_len {
                return Err(BinstackError::Format {
                    cause: format!(
                        "decompressed {} bytes, header says {}",
                        framed.len(),
                        original_len
                    ),
                });
            }
            framed
        } else {
            payload.to_vec()
        };

        Ok(ArrayFileContents {
            header,
            file_len: bytes.len(),
            framed,
        })
    }

    /// Load the array stored at `path`, whatever its element kind.
    pub fn load_any(&self, path: impl AsRef<Path>) -> Result<AnyArray> {
        let path = path.as_ref();
        let contents = self.inspect(path)?;
        let view = contents.view()?;

        let recovered = view
            .reconstruct(RecoveryPolicy::PreferRecovered)
            .next()
            .ok_or(BinstackError::NotFound {
                what: "array record",
            })??;
        if !recovered.lengths_agree() {
            tracing::warn!(
                path = %path.display(),
                reported_len = recovered.reported_len(),
                recovered_len = recovered.recovered_len(),
                "Array record length disagrees with guards"
            );
        }

        let array = recovered.record().decode_array()?;
        tracing::info!(path = %path.display(), array = %array, "Array file loaded");
        Ok(array)
    }

    /// Load the array stored at `path` as element type `T`.
    pub fn load<T: Element>(&self, path: impl AsRef<Path>) -> Result<Array<T>> {
        self.load_any(path)?.downcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::ElementKind;

    fn mock() -> (Arc<MockFs>, ArrayFile) {
        let fs = Arc::new(MockFs::new());
        let files = ArrayFile::new(fs.clone(), Arc::new(ZlibCompressor));
        (fs, files)
    }

    #[test]
    fn header_round_trip() {
        let header = ArrayFileHeader {
            compressed: true,
            compressor: "zlib".to_string(),
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..16], b"BINSTACK-ARRAY01");
        assert_eq!(bytes[17], b'z');
        assert_eq!(ArrayFileHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn uncompressed_header_is_blank() {
        let bytes = ArrayFileHeader {
            compressed: false,
            compressor: String::new(),
        }
        .to_bytes();
        assert!(bytes[16..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn save_and_load_compressed() {
        let (_, files) = mock();
        let array = Array::from_vec(3, 4, (0..12).map(|v| v as i64 - 6).collect()).unwrap();
        let options = SaveOptions::default().with_compression(6);
        files.save("/a.bin", &array, &options).unwrap();

        let contents = files.inspect("/a.bin").unwrap();
        assert!(contents.header.compressed);
        assert_eq!(contents.header.compressor, "zlib");
        assert_eq!(files.load::<i64>("/a.bin").unwrap(), array);
    }

    #[test]
    fn object_name_is_stored() {
        let (_, files) = mock();
        let array: Array<u8> = Array::new(1, 1);
        files
            .save("/n.bin", &array, &SaveOptions::default().with_object_name("frame"))
            .unwrap();
        let contents = files.inspect("/n.bin").unwrap();
        let view = contents.view().unwrap();
        let record = view.records().next().unwrap().unwrap();
        assert_eq!(record.object_name(), "frame");
    }

    #[test]
    fn invalid_level_is_rejected() {
        let (fs, files) = mock();
        let array: Array<u8> = Array::new(1, 1);
        let err = files
            .save("/x.bin", &array, &SaveOptions::default().with_compression(10))
            .unwrap_err();
        assert!(matches!(err, BinstackError::InvalidParameter { .. }));
        assert!(fs.all_files().is_empty());
    }

    #[test]
    fn bad_magic_is_format_error() {
        let (fs, files) = mock();
        files
            .save("/m.bin", &Array::<u16>::new(2, 2), &SaveOptions::default())
            .unwrap();
        fs.modify("/m.bin", |bytes| bytes[0] = b'X');

        let err = files.load_any("/m.bin").unwrap_err();
        assert_eq!(err.code(), "E103");
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn short_file_is_format_error() {
        let fs = Arc::new(MockFs::new().with_file("/s.bin", b"BINSTACK"));
        let files = ArrayFile::new(fs, Arc::new(ZlibCompressor));
        assert!(matches!(
            files.load_any("/s.bin"),
            Err(BinstackError::Format { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let (_, files) = mock();
        let err = files.load_any("/missing.bin").unwrap_err();
        assert!(matches!(err, BinstackError::Io { .. }));
    }

    #[test]
    fn truncated_compressed_stream_is_format_error() {
        let (fs, files) = mock();
        let array: Array<f64> = Array::new(8, 8);
        files
            .save("/t.bin", &array, &SaveOptions::default().with_compression(1))
            .unwrap();
        fs.modify("/t.bin", |bytes| {
            let len = bytes.len();
            bytes.truncate(len - 3);
        });
        assert!(matches!(
            files.load_any("/t.bin"),
            Err(BinstackError::Format { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_format_error() {
        let fs = Arc::new(MockFs::new());
        let files = ArrayFile::new(fs.clone(), Arc::new(IdentityCompressor));
        files
            .save("/l.bin", &Array::<i8>::new(2, 2), &SaveOptions::default().with_compression(3))
            .unwrap();
        // Claim one more original byte than the stream holds.
        fs.modify("/l.bin", |bytes| bytes[32] = bytes[32].wrapping_add(1));
        assert!(matches!(
            files.load_any("/l.bin"),
            Err(BinstackError::Format { .. })
        ));
    }

    #[test]
    fn load_any_reports_kind() {
        let (_, files) = mock();
        let words = Array::from_vec(1, 2, vec!["left".to_string(), "right".to_string()]).unwrap();
        files.save("/w.bin", &words, &SaveOptions::default()).unwrap();

        let any = files.load_any("/w.bin").unwrap();
        assert_eq!(any.kind(), ElementKind::Str);
        assert!(files.load::<u8>("/w.bin").is_err());
    }
}
