//! Render error types.

use thiserror::Error;

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Render error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Worker pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid scheduler configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
