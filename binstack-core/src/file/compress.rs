//! Pluggable compressors for array file payloads.

use crate::error::{BinstackError, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// A whole-buffer compressor.
pub trait Compressor: Send + Sync {
    /// Short name recorded in the file header.
    fn name(&self) -> &str;

    /// Compress `data` at `level` (1..=9).
    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>>;

    /// Decompress `data`, which the header says expands to `original_len`.
    fn decompress(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>>;
}

fn compression_error(e: std::io::Error) -> BinstackError {
    BinstackError::Compression {
        cause: e.to_string(),
    }
}

/// zlib streams through `flate2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCompressor;

impl Compressor for ZlibCompressor {
    fn name(&self) -> &str {
        "zlib"
    }

    fn compress(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(data).map_err(compression_error)?;
        encoder.finish().map_err(compression_error)
    }

    fn decompress(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        // The length comes from the file, so it bounds the read but is not
        // reserved up front. One byte past it is enough to detect a mismatch.
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .take(original_len as u64 + 1)
            .read_to_end(&mut out)
            .map_err(compression_error)?;
        Ok(out)
    }
}

/// Stores bytes unchanged; for tests and for tools that want the
/// compressed layout without the CPU cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityCompressor;

impl Compressor for IdentityCompressor {
    fn name(&self) -> &str {
        "identity"
    }

    fn compress(&self, data: &[u8], _level: u32) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _original_len: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_shrinks_repetitive_data() {
        let data = vec![7u8; 4096];
        let zlib = ZlibCompressor;
        let packed = zlib.compress(&data, 6).unwrap();
        assert!(packed.len() < 100);
        assert_eq!(zlib.decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn zlib_rejects_garbage() {
        let err = ZlibCompressor.decompress(&[1, 2, 3, 4, 5], 10).unwrap_err();
        assert_eq!(err.code(), "E902");
    }

    #[test]
    fn zlib_ignores_inflated_length_claim() {
        let data = vec![1u8; 64];
        let packed = ZlibCompressor.compress(&data, 1).unwrap();
        let out = ZlibCompressor.decompress(&packed, u32::MAX as usize).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn identity_is_identity() {
        let data = b"abc";
        assert_eq!(IdentityCompressor.compress(data, 9).unwrap(), data);
        assert_eq!(IdentityCompressor.name(), "identity");
    }
}
