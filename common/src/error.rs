//! Error types shared by the exporters and parsers

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Excel error: {0}")]
    Excel(String),
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;
