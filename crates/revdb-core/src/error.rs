//! Error types for revdb core
//!
//! Every fallible operation hands back an [`Error`] value; nothing in the core
//! panics or retries on the caller's behalf. [`Error::report`] flattens an
//! error into an [`ErrorReport`] that a host binding can forward across a
//! runtime boundary without knowing anything about Rust error types.

use crate::revision::RevisionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed cause carried by [`Error::Store`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Revision conflict on {document}: expected parent {}, current is {}",
        display_rev(.expected),
        display_rev(.actual)
    )]
    Conflict {
        document: String,
        expected: Option<RevisionId>,
        actual: Option<RevisionId>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Store(#[source] BoxError),
}

fn display_rev(rev: &Option<RevisionId>) -> String {
    match rev {
        Some(rev) => rev.to_string(),
        None => "(none)".to_string(),
    }
}

impl Error {
    /// Wrap an underlying storage failure, keeping it as the error source
    pub fn store(cause: impl Into<BoxError>) -> Self {
        Error::Store(cause.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Store(_) => ErrorKind::Store,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Structured form of this error for callers outside the Rust runtime
    pub fn report(&self) -> ErrorReport {
        let kind = self.kind();
        ErrorReport {
            kind,
            code: kind.code().to_string(),
            status: kind.status(),
            message: self.to_string(),
        }
    }
}

/// Failure category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Expected parent did not match the current revision
    Conflict,
    /// Document or revision does not exist
    NotFound,
    /// Malformed properties or identifiers
    Validation,
    /// Opaque failure of an underlying storage collaborator
    Store,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Store => "STORE_ERROR",
        }
    }

    /// HTTP-style status code
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Conflict => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Store => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Flat, serializable description of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: String,
    pub status: u16,
    pub message: String,
}

/// Result type alias for revdb core operations
pub type Result<T> = std::result::Result<T, Error>;
