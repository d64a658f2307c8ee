//! Error types for core value parsing.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A color string could not be parsed.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// A text layout parameter is out of range.
    #[error("Invalid text layout: {0}")]
    InvalidLayout(String),
}
