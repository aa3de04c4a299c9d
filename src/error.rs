//! Error handling types for tsugi.
//!
//! Only contract violations and I/O or parse failures are errors. Cancellation,
//! declined suggestions, backend failures and stale edits are ordinary outcomes
//! of a next-edit request and never surface as `NesError`.

use std::sync::PoisonError;
use thiserror::Error;

/// Error type for workspace, history and orchestration operations.
#[derive(Debug, Error)]
pub enum NesError {
    /// No open document with the given id
    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    /// A document with the given id is already open
    #[error("Document already open: {id}")]
    DocumentAlreadyOpen { id: String },

    /// An edit does not fit the text it is applied to, or violates edit invariants
    #[error("Invalid edit: {message}")]
    InvalidEdit { message: String },

    /// A selection range lies outside the document
    #[error("Invalid selection for {id}: {message}")]
    InvalidSelection { id: String, message: String },

    /// A request was built for a document without any selection
    #[error("No selection for document: {id}")]
    NoSelection { id: String },

    /// A replay recording is malformed or inconsistent
    #[error("Invalid recording: {message}")]
    Recording { message: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for tsugi operations
pub type NesResult<T> = Result<T, NesError>;

/// Helper trait to recover from poisoned locks instead of failing.
pub trait LockResultExt<T> {
    /// Recover the guard of a poisoned lock, logging which operation hit it.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "tsugi::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

impl NesError {
    pub fn document_not_found(id: impl ToString) -> Self {
        NesError::DocumentNotFound { id: id.to_string() }
    }

    pub fn document_already_open(id: impl ToString) -> Self {
        NesError::DocumentAlreadyOpen { id: id.to_string() }
    }

    pub fn invalid_edit(message: impl Into<String>) -> Self {
        NesError::InvalidEdit {
            message: message.into(),
        }
    }

    pub fn invalid_selection(id: impl ToString, message: impl Into<String>) -> Self {
        NesError::InvalidSelection {
            id: id.to_string(),
            message: message.into(),
        }
    }

    pub fn no_selection(id: impl ToString) -> Self {
        NesError::NoSelection { id: id.to_string() }
    }

    pub fn recording(message: impl Into<String>) -> Self {
        NesError::Recording {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        NesError::Config {
            message: message.into(),
        }
    }
}
