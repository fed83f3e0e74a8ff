//! Public error type
//!
//! Backend signals are masked into a stable `ErrorKind` while the original
//! cause stays reachable through `Error::store_error` and
//! `std::error::Error::source`. Every error names the operation and key.

use crate::storage::{BoxError, ConfigError, StoreError};
use std::fmt;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    WriteFile,
    GetFile,
    Create,
    Get,
    Put,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::WriteFile => "write_file",
            Operation::GetFile => "get_file",
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Put => "put",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

/// Stable classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// No object exists for the key
    #[error("object not found")]
    NotFound,
    /// Create found an existing object
    #[error("object already exists")]
    AlreadyExists,
    /// Another writer updated the object since it was observed
    #[error("generation conflict")]
    Conflict,
    /// Value could not be serialized
    #[error("encode failed")]
    Encode,
    /// Stored bytes are not a valid encoding of the value type
    #[error("decode failed")]
    Decode,
    /// Call exceeded its deadline
    #[error("timed out")]
    Timeout,
    /// Bucket unreachable or inaccessible at construction
    #[error("bucket unavailable")]
    Unavailable,
    /// Invalid configuration
    #[error("invalid configuration")]
    InvalidConfig,
    /// Key maps to a path the backend cannot store verbatim
    #[error("invalid key")]
    InvalidKey,
    /// Any other storage or transport failure
    #[error("storage I/O failed")]
    Io,
}

impl From<&StoreError> for ErrorKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StoreError::Precondition { .. } => ErrorKind::Conflict,
            StoreError::TimedOut { .. } => ErrorKind::Timeout,
            StoreError::InvalidPath { .. } => ErrorKind::InvalidKey,
            StoreError::Io(_) | StoreError::Other(_) => ErrorKind::Io,
        }
    }
}

/// Error returned by client and store operations
#[derive(Debug, Error)]
#[error("{op} {key}: {kind}")]
pub struct Error {
    op: Operation,
    key: String,
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(op: Operation, key: impl Into<String>, kind: ErrorKind) -> Self {
        Error {
            op,
            key: key.into(),
            kind,
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Mask a backend error, keeping it as the cause
    pub fn from_store(op: Operation, key: impl Into<String>, err: StoreError) -> Self {
        let kind = ErrorKind::from(&err);
        Error::new(op, key, kind).with_source(err)
    }

    /// Backend error reported as a conflict (lost compare-and-swap)
    pub(crate) fn conflict(op: Operation, key: impl Into<String>, err: StoreError) -> Self {
        Error::new(op, key, ErrorKind::Conflict).with_source(err)
    }

    pub(crate) fn config(op: Operation, key: impl Into<String>, err: ConfigError) -> Self {
        Error::new(op, key, ErrorKind::InvalidConfig).with_source(err)
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    /// The backend error this was masked from, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<StoreError>())
    }
}

impl PartialEq<ErrorKind> for Error {
    fn eq(&self, kind: &ErrorKind) -> bool {
        self.kind == *kind
    }
}
