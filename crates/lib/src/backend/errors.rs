//! Backend error types for confvault storage.
//!
//! Everything that goes wrong below the `ConfigStore`/`UserStore` contract
//! (SQL failures, filesystem I/O, corrupted objects) is reported through
//! [`BackendError`] and classified as a backend failure by the crate error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the persistence layer.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// A SQL operation failed.
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Context plus the driver message
        reason: String,
        /// The underlying sqlx error, when there is one
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A filesystem operation failed.
    #[error("File I/O error on {}", path.display())]
    FileIo {
        /// The path being accessed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A stored object no longer matches its own metadata.
    #[error("Object {object_id} is corrupt: {reason}")]
    IntegrityViolation {
        /// The object identifier
        object_id: String,
        /// What did not match
        reason: String,
    },

    /// A value read back from storage is outside its valid range.
    #[error("Invalid stored value for {field}: {reason}")]
    InvalidStoredValue {
        /// The column or attribute name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl BackendError {
    /// Check if this error came from the SQL driver.
    pub fn is_sql_error(&self) -> bool {
        matches!(self, BackendError::SqlxError { .. })
    }

    /// Check if this error is related to filesystem I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(self, BackendError::FileIo { .. })
    }

    /// Check if this error indicates corrupted or inconsistent stored data.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            BackendError::IntegrityViolation { .. } | BackendError::InvalidStoredValue { .. }
        )
    }

    /// Build a [`BackendError::FileIo`] for `path`.
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackendError::FileIo {
            path: path.into(),
            source,
        }
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
