//! Error taxonomy for the object store.

use thiserror::Error;

/// Errors produced by any object store operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Hash key absent from both the loose and packed layouts.
    #[error("object not found")]
    NotFound,
    /// Operation attempted on a container missing `config` or catalog schema.
    #[error("container is not initialised")]
    NotInitialised,
    /// Unknown hash algorithm, unknown compression token, or malformed config.
    #[error("config error: {0}")]
    Config(String),
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Size/length/digest mismatch on read, truncated pack, or a catalog row
    /// pointing past the end of its pack file.
    #[error("corrupt data: {0}")]
    Corrupt(String),
    /// Failed to acquire the container lock within the allotted grace.
    #[error("concurrency error: {0}")]
    Concurrency(String),
    /// Catalog backend failure.
    #[error("catalog: {0}")]
    Catalog(#[from] rusqlite::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
