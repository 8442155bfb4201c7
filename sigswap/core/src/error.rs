use std::path::PathBuf;

use thiserror::Error;

/// Validation failures raised while importing or editing mapping rules.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Payload was not valid JSON.
    #[error("malformed mapping JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Payload root was valid JSON but not an array.
    #[error("mapping payload must be a JSON array of rules, found {found}")]
    NotASequence {
        /// JSON type name of the rejected root.
        found: &'static str,
    },
    /// An array element did not match the rule schema.
    #[error("rule #{index} is invalid: {reason}")]
    InvalidRecord {
        /// Zero-based position in the payload.
        index: usize,
        /// What was wrong with the record.
        reason: String,
    },
    /// Two rules in one payload share an id.
    #[error("duplicate rule id {id:?}")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },
}

/// Failures of a headless batch invocation. Every variant is fatal to the run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Arguments did not match the batch surface.
    #[error("{0}")]
    Usage(String),
    /// The input script does not exist.
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    /// The external mapping file does not exist.
    #[error("mapping file not found: {}", .0.display())]
    MappingNotFound(PathBuf),
    /// Reading or writing a file failed.
    #[error("{context}: {source}")]
    Io {
        /// Operation that failed, including the path.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The external mapping file failed validation.
    #[error("invalid mapping file: {0}")]
    Mapping(#[from] MappingError),
}

impl BatchError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Outcome of an AI-assisted collaborator call that did not succeed.
#[derive(Debug, Error)]
pub enum AssistError {
    /// No collaborator is configured for this session.
    #[error("{0} is not configured")]
    Unavailable(&'static str),
    /// The collaborator ran and failed.
    #[error("assistant failed: {0}")]
    Failed(#[from] anyhow::Error),
}
