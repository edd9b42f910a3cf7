//! Error type for collaborator fixtures
//!
//! Covers loading schema and principal descriptions from JSON files.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed fixture JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Two schemas registered for the same entity kind
    #[error("Duplicate schema for entity kind: {0}")]
    DuplicateKind(String),
}
