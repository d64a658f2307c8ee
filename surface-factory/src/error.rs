//! Surface factory error types.

use thiserror::Error;

/// Result type for surface factory operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while creating or drawing surfaces.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The GPU device backing a borrowed graphics device is lost.
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// Hardware adapter initialization failed.
    #[error("GPU initialization failed: {0}")]
    GpuInit(String),

    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Image source could not be read.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// The URI scheme is not handled by the loader.
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),

    /// Raw pixel buffer does not match its declared dimensions.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The object was used after teardown.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No tokio runtime is available to schedule background draws.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Text could not be laid out or rasterized.
    #[error("Text rendering failed: {0}")]
    Text(String),
}

impl From<surface_core::CoreError> for RenderError {
    fn from(err: surface_core::CoreError) -> Self {
        Self::Text(err.to_string())
    }
}
