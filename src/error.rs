//! Error types for dump and load sessions.

use crate::value::RecordId;
use thiserror::Error;

/// Errors that can occur while dumping or loading replicants.
#[derive(Error, Debug)]
pub enum ReplicateError {
    #[error("{type_name} does not provide a dump capability")]
    MissingCapability { type_name: String },

    #[error("Unknown replicant type: {0}")]
    UnknownType(String),

    #[error("Reference to {type_name} {id} missing from keymap")]
    UnresolvedReference { type_name: String, id: RecordId },

    #[error("Loading {type_name} {id} failed: {source}")]
    Load {
        type_name: String,
        id: RecordId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Listener failed: {0}")]
    Listener(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Truncated frame: expected {expected} bytes but only {actual} available")]
    Truncated { expected: usize, actual: usize },

    #[error("Corrupt stream: {0}")]
    Corrupt(String),
}

/// Result type for replicant operations.
pub type Result<T> = std::result::Result<T, ReplicateError>;
