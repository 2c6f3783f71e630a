// ============================================================================
// ERRORS: one enum for every fallible engine operation
// ============================================================================

use thiserror::Error;

/// Error type shared by the surface, history, fill, I/O and config layers.
///
/// `OutOfBounds` and `NoHistory` are ordinary user-triggered conditions and
/// are always returned, never raised as panics. `Configuration` is a setup
/// error and is expected to reach the embedding application at start-up.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("pixel ({x}, {y}) is outside the canvas")]
    OutOfBounds { x: i64, y: i64 },

    #[error("no history in that direction")]
    NoHistory,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported mime type '{0}'")]
    UnsupportedMime(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl From<bincode::Error> for CanvasError {
    fn from(e: bincode::Error) -> Self {
        CanvasError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for CanvasError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => CanvasError::Io(io),
            other => CanvasError::Encode(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CanvasError>;
