//! Error Handling Module
//!
//! Defines the error type for the tomato leaf classifier library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for classifier operations
#[derive(Error, Debug)]
pub enum TomatoError {
    /// An image file could not be opened or decoded
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Raw image bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// Request input that does not satisfy the model's input contract
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error with dataset discovery or loading
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with the model or its artifact
    #[error("Model error: {0}")]
    Model(String),

    /// Error during training
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TomatoError {
    /// Whether the error was caused by the caller's input rather than server state
    pub fn is_client_error(&self) -> bool {
        matches!(self, TomatoError::ImageDecode(_) | TomatoError::InvalidInput(_))
    }
}

impl From<serde_json::Error> for TomatoError {
    fn from(err: serde_json::Error) -> Self {
        TomatoError::Serialization(err.to_string())
    }
}

/// Convenience Result type for classifier operations
pub type Result<T> = std::result::Result<T, TomatoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TomatoError::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/leaf.jpg");
        let err = TomatoError::ImageLoad(path, "file not found".to_string());
        assert!(format!("{}", err).contains("leaf.jpg"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(TomatoError::ImageDecode("bad".into()).is_client_error());
        assert!(TomatoError::InvalidInput("short".into()).is_client_error());
        assert!(!TomatoError::Model("missing".into()).is_client_error());
        assert!(!TomatoError::Io(std::io::Error::other("disk")).is_client_error());
    }
}
