use thiserror::Error;

/// Result type alias for disk image operations
pub type Result<T> = std::result::Result<T, DiskError>;

/// Errors that can occur when working with Apple II disk images
///
/// Decoding never fails with these: sector and block reads return `None`
/// and chain walks stop quietly. These cover the outer operations
/// (opening files, strict validation, lookup by name).
#[derive(Debug, Error)]
pub enum DiskError {
    /// I/O error occurred while reading an image file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unrecognized image format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Image size does not match what the format requires
    #[error("Invalid image size: expected {expected}, got {actual} bytes")]
    InvalidImageSize {
        /// Expected size description
        expected: String,
        /// Actual size in bytes
        actual: usize,
    },

    /// Filesystem-related error
    #[error("Filesystem error: {0}")]
    FileSystemError(String),

    /// File not found in filesystem
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File exists but its content could not be resolved
    #[error("Unable to read content of {0}")]
    NoContent(String),
}

impl DiskError {
    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        DiskError::InvalidFormat(message.into())
    }

    /// Create a filesystem error
    pub fn filesystem<S: Into<String>>(message: S) -> Self {
        DiskError::FileSystemError(message.into())
    }
}
