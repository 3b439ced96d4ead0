//! Error types for tracetile-core.

use thiserror::Error;

/// Result type alias for tracetile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for tracetile operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A view parameter that must be at least 1 was zero.
    #[error("invalid view configuration: {0}")]
    InvalidViewConfig(String),

    /// A sample range with `minimum > maximum`.
    #[error("invalid sample range: {minimum}..{maximum}")]
    InvalidRange { minimum: u64, maximum: u64 },
}
