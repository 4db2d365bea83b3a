//! Error types for the sdsrec-core library.
//!
//! The taxonomy mirrors the recovery model: only failures to open or stat
//! the input are fatal. Everything else (header mismatches, truncated
//! payloads, malformed datums, even mid-scan I/O errors) funnels back
//! into the controller's byte-granular resynchronization.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all recovery operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open or read the input file
    #[error("failed to open file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to stat the input file
    #[error("failed to stat file '{path}': {source}")]
    FileStat {
        /// Path to the file that failed to stat
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Seek or read failed while scanning an already-open stream
    #[error("stream error at offset {offset:#x}: {source}")]
    Stream {
        /// Byte offset the scan was positioned at
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A 16-byte window failed the header acceptance predicate
    #[error("no header candidate at offset {offset:#x}")]
    HeaderMismatch {
        /// Byte offset of the rejected window
        offset: u64,
    },

    /// An accepted header declared more payload than the stream holds
    #[error(
        "incomplete record at offset {offset:#x}: declared {declared} bytes, {available} readable"
    )]
    IncompleteRecord {
        /// Byte offset of the accepted header
        offset: u64,
        /// Payload size the header declared
        declared: u32,
        /// Payload bytes actually readable
        available: u64,
    },

    /// A datum scanner rule was violated
    #[error("malformed datum at window offset {offset:#x}: {details}")]
    DatumFormat {
        /// Offset inside the scan window where the rule failed
        offset: usize,
        /// Which rule failed
        details: String,
    },
}

impl Error {
    /// Creates a new file open error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file stat error
    pub fn file_stat(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileStat {
            path: path.into(),
            source,
        }
    }

    /// Creates a new mid-scan stream error
    pub fn stream(offset: u64, source: std::io::Error) -> Self {
        Self::Stream { offset, source }
    }

    /// Creates a new datum format error
    pub fn datum_format(offset: usize, details: impl Into<String>) -> Self {
        Self::DatumFormat {
            offset,
            details: details.into(),
        }
    }

    /// Returns true if this failure is absorbed by resynchronization
    /// rather than ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Stream { .. }
                | Self::HeaderMismatch { .. }
                | Self::IncompleteRecord { .. }
                | Self::DatumFormat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::datum_format(7, "unterminated name field");
        assert!(err.to_string().contains("0x7"));
        assert!(err.to_string().contains("unterminated name field"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::HeaderMismatch { offset: 0 }.is_recoverable());
        assert!(Error::datum_format(0, "test").is_recoverable());
        assert!(!Error::file_read(
            "/missing",
            std::io::Error::from(std::io::ErrorKind::NotFound)
        )
        .is_recoverable());
    }
}
