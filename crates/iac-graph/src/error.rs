// error.rs - Error types for graph construction and source parsing.

use thiserror::Error;

/// Errors that can occur while loading a resource graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A source file is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    /// A source file parsed, but does not have the expected shape.
    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    /// The reference-detection pattern failed to compile.
    #[error("invalid reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}
