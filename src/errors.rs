use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error carried by the structured variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for background removal.
///
/// Each variant carries the context of its error domain (filesystem, image
/// processing, model inference, segmentation provider) so callers can react to
/// the failure without parsing strings. Every variant is recoverable: the
/// caller may re-invoke the failed operation with corrected input.
#[derive(Error, Debug)]
pub enum CutoutError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Segmentation provider `{provider}` failed")]
    Segmentation {
        provider: String,
        #[source]
        source: BoxError,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CutoutError>;

impl CutoutError {
    pub fn segmentation(provider: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Segmentation {
            provider: provider.into(),
            source: source.into(),
        }
    }

    pub fn model(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Model {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// The image-ops layer checks its preconditions with `anyhow::ensure!`; those
/// failures surface here as image processing errors without file context.
impl From<anyhow::Error> for CutoutError {
    fn from(err: anyhow::Error) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "mask computation".to_string(),
            source: err.into(),
        }
    }
}

/// Fallback for I/O errors raised without path context. Code that knows the
/// path should build `CutoutError::FileSystem` directly.
impl From<std::io::Error> for CutoutError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for CutoutError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for CutoutError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}
