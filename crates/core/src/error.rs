//! Error types for the curation engine

use thiserror::Error;

/// Curation pipeline errors
///
/// Configuration problems are fatal and raised before any processing starts.
/// Data integrity problems are never represented here; they flow through
/// validation issues so one malformed record cannot abort a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataset too small: {0}")]
    Capacity(String),

    #[error("Format error: {0}")]
    Format(#[from] datacurate_formats::Error),
}

/// Result type alias for curation operations
pub type Result<T> = std::result::Result<T, Error>;
