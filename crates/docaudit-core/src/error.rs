//! Error types for the audit core
//!
//! None of these ever reach the caller of a primary insert/update. The hook
//! dispatcher logs them at the point of occurrence and moves on; they only
//! surface through direct calls into the library (snapshot, scanner, stores).

use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for audit core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the audit system
#[derive(Error, Debug)]
pub enum Error {
    /// Requested record does not exist (e.g. no meta for an updated document)
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Input has the wrong shape (e.g. snapshot of a non-struct value)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Per-directory parse or resolution failure during the startup scan
    #[error("Scan error in {}: {message}", path.display())]
    Scan {
        /// Directory or file that failed
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Failure reported by a document store adapter
    #[error("Document store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request context was cancelled or its deadline passed
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Registration attempted after the registry was sealed
    #[error("Model registry is sealed, cannot register {0}")]
    RegistrySealed(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid data error
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a scan error for a path
    pub fn scan(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a document store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Whether this is a [`Error::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Lets the snapshot serializer report shape errors through serde
impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::InvalidData(msg.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
