//! Error types for Nimbus.

use thiserror::Error;

use crate::upload::UploadError;

/// Common error type for Nimbus.
#[derive(Error, Debug)]
pub enum NimbusError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upload engine error.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Result type alias for Nimbus operations.
pub type Result<T> = std::result::Result<T, NimbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = NimbusError::Validation("size too large".to_string());
        assert_eq!(err.to_string(), "validation error: size too large");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = NimbusError::NotFound("File: a.bin".to_string());
        assert_eq!(err.to_string(), "File: a.bin not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NimbusError = io_err.into();
        assert!(matches!(err, NimbusError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_upload_error_is_transparent() {
        let err: NimbusError = UploadError::UnknownUpload("x.bin".to_string()).into();
        assert!(matches!(err, NimbusError::Upload(UploadError::UnknownUpload(_))));
        assert_eq!(err.to_string(), "no active upload for x.bin");
    }
}
