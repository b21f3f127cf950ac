//! Error types for binstack.
//!
//! Every fallible operation returns a [`BinstackError`] at the point of
//! failure. Errors carry the offset or size that triggered them so a caller
//! can abort the current record or array without tearing down the process.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for binstack operations.
#[derive(Error, Debug)]
pub enum BinstackError {
    // =========================================================================
    // Allocation Errors (E001-E099)
    // =========================================================================
    /// A request exceeds the remaining capacity of a buffer.
    ///
    /// Also reported when a decoder is handed fewer bytes than a fixed-size
    /// header needs.
    #[error("E001: Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// A parameter is outside its permitted range.
    #[error("E002: Invalid parameter '{name}': {cause}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        cause: String,
    },

    // =========================================================================
    // Integrity Errors (E100-E199)
    // =========================================================================
    /// Guard words or length fields are inconsistent with the buffer.
    #[error("E101: Corruption detected at offset {offset}: {cause}")]
    Corruption {
        /// Byte offset, relative to the start of the stack, of the bad segment.
        offset: usize,
        /// Description of the corruption.
        cause: String,
    },

    /// Outer framing could not be located in a raw byte stream.
    #[error("E102: {what} not found")]
    NotFound {
        /// What was being searched for.
        what: &'static str,
    },

    /// A file header or encoded value is malformed.
    #[error("E103: Invalid format: {cause}")]
    Format {
        /// Description of the format problem.
        cause: String,
    },

    // =========================================================================
    // Type Errors (E200-E299)
    // =========================================================================
    /// The encoded element kind is not one of the supported basic types,
    /// or does not match the type the caller asked for.
    #[error("E201: Unsupported type: {cause}")]
    UnsupportedType {
        /// Description of the type problem.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// File system error.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },

    /// Compression or decompression failed.
    #[error("E902: Compression error: {cause}")]
    Compression {
        /// Description of the compressor failure.
        cause: String,
    },
}

impl BinstackError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "E001",
            Self::InvalidParameter { .. } => "E002",
            Self::Corruption { .. } => "E101",
            Self::NotFound { .. } => "E102",
            Self::Format { .. } => "E103",
            Self::UnsupportedType { .. } => "E201",
            Self::Io { .. } => "E901",
            Self::Compression { .. } => "E902",
        }
    }

    /// Check if this error means stored data is damaged, as opposed to a
    /// caller mistake or an environment failure.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corruption { .. } | Self::NotFound { .. } | Self::Format { .. }
        )
    }

    pub(crate) fn short_buffer(requested: usize, available: usize) -> Self {
        Self::OutOfMemory {
            requested,
            available,
        }
    }

    pub(crate) fn corruption(offset: usize, cause: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            cause: cause.into(),
        }
    }
}

/// Result type alias using `BinstackError`.
pub type Result<T> = std::result::Result<T, BinstackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_correct() {
        let err = BinstackError::OutOfMemory {
            requested: 64,
            available: 16,
        };
        assert_eq!(err.code(), "E001");

        let err = BinstackError::corruption(48, "bad guard");
        assert_eq!(err.code(), "E101");
    }

    #[test]
    fn error_display() {
        let err = BinstackError::OutOfMemory {
            requested: 4096,
            available: 128,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("E001"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn corruption_classification() {
        assert!(BinstackError::corruption(0, "x").is_corruption());
        assert!(BinstackError::NotFound { what: "footer" }.is_corruption());
        assert!(
            !BinstackError::InvalidParameter {
                name: "requested_bytes",
                cause: "zero".to_string()
            }
            .is_corruption()
        );
    }
}
