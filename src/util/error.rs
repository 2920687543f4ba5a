//! Error types for the framecache library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of a store file
    #[error("Invalid cache store: bad magic bytes")]
    InvalidMagic,

    /// Unsupported store format version
    #[error("Unsupported store version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Malformed data structure in a store file
    #[error("Invalid store structure: {0}")]
    InvalidStructure(String),

    /// Mutation attempted on a store opened in read mode
    #[error("Store is read-only")]
    ReadOnly,

    /// File opened for reading lacks the objects/headers containers
    #[error("Not an attribute cache file: {0}")]
    NotAnAttributeCacheFile(PathBuf),

    /// Requested object, attribute or header is absent
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Interpolation inputs of differing kinds
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Malformed regex passed to a filtered attribute listing
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// InterpolatedCache operation attempted without a usable path template
    #[error("Path template not set")]
    PathTemplateNotSet,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an entry-not-found error with naming context.
    pub fn entry_not_found(msg: impl Into<String>) -> Self {
        Self::EntryNotFound(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::EntryNotFound("attribute 'radius' of object 'sphere1'".into());
        assert!(e.to_string().contains("radius"));
        assert!(e.to_string().contains("sphere1"));

        let e = Error::TypeMismatch {
            expected: "FloatData",
            actual: "IntData",
        };
        assert!(e.to_string().contains("FloatData"));
        assert!(e.to_string().contains("IntData"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
