//! Error types for parsing, generation and file operations.
//!
//! Internal failures (`ParseFailure`, `GenerateFailure`, storage I/O) never
//! leave the file facade raw: they are wrapped into a `FileError` carrying a
//! user-facing message and a client-error status.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Status attached to every structured file error.
pub const CLIENT_ERROR_STATUS: u16 = 400;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("Syntax error: {}", .messages.join("; "))]
    Syntax { messages: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateFailure {
    #[error("Invalid identifier name: {0}")]
    InvalidIdentifier(String),

    #[error("Comment text cannot be emitted: {0}")]
    UnrepresentableComment(String),

    #[error("Generated source does not parse: {}", .messages.join("; "))]
    InvalidOutput { messages: Vec<String> },
}

/// The failure underneath a `FileError`.
#[derive(Error, Debug)]
pub enum FailureCause {
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Generate(#[from] GenerateFailure),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid refactor data: {0}")]
    RefactorData(#[from] serde_json::Error),
}

impl FailureCause {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCause::Parse(_) => "ParseFailure",
            FailureCause::Generate(_) => "GenerateFailure",
            FailureCause::Storage(_) => "StorageFailure",
            FailureCause::RefactorData(_) => "RefactorDataFailure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Parsing,
    Saving,
    Refactoring,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Parsing => "Parsing",
            Operation::Saving => "Saving",
            Operation::Refactoring => "Refactoring",
        };
        f.write_str(label)
    }
}

/// Structured error returned by every file operation.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct FileError {
    pub operation: Operation,
    pub message: String,
    pub status: u16,
    #[source]
    pub cause: FailureCause,
}

impl FileError {
    pub fn new(operation: Operation, path: &Path, cause: impl Into<FailureCause>) -> Self {
        FileError {
            operation,
            message: format!("{} \"{}\" failed.", operation, path.display()),
            status: CLIENT_ERROR_STATUS,
            cause: cause.into(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            kind: self.cause.kind().to_string(),
            message: self.message.clone(),
            status: self.status,
        }
    }
}

/// Serializable projection of a `FileError` for external consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub kind: String,
    pub message: String,
    pub status: u16,
}
