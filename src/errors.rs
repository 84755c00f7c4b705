//! Unified error type for the catalog core.
//!
//! Every fallible operation returns [`Result`]. The variants that a caller can act on
//! (`ValidationFailed`, `Conflict`, `NotFound`, `InvalidFormat`) carry enough detail for a
//! transport layer to build a field-level response; [`Error::kind`] gives the coarse class.

use thiserror::Error;

/// Errors produced by catalog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Raw I/O failure outside of attachment storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A field is missing, malformed, or breaks a cross-entity rule
    #[error("Validation failed on `{field}`: {message}")]
    ValidationFailed {
        /// Request field the failure refers to
        field: String,
        /// Human-readable reason
        message: String,
    },

    /// A uniquely named resource already exists
    #[error("{resource} '{name}' already exists")]
    Conflict {
        /// Kind of resource (e.g. "product")
        resource: &'static str,
        /// The conflicting name
        name: String,
    },

    /// A resource addressed by id does not exist
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource (e.g. "product", "pdf")
        resource: &'static str,
        /// The id that was looked up
        id: i64,
    },

    /// An attachment payload does not have the expected data-URI shape
    #[error("Invalid {kind} payload: {message}")]
    InvalidFormat {
        /// Attachment kind the payload was submitted as
        kind: &'static str,
        /// Human-readable reason
        message: String,
    },

    /// Writing or deleting a stored attachment failed
    #[error("Storage failure on '{path}': {source}")]
    StorageFailure {
        /// Storage-relative path being accessed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Coarse error class, for mapping onto transport-level statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client supplied bad input
    ValidationFailed,
    /// Duplicate resource
    Conflict,
    /// Unknown resource
    NotFound,
    /// Malformed attachment payload
    InvalidFormat,
    /// Server-side failure (database, storage, configuration)
    Internal,
}

impl Error {
    /// Builds a [`Error::ValidationFailed`] for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the caller-facing class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::StorageFailure { .. } => ErrorKind::Internal,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
