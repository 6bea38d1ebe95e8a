//! Error types for the configuration store.
//!
//! These cover the artifact-level failures of the `ConfigStore` contract.
//! Persistence failures are reported separately as
//! [`BackendError`](crate::backend::BackendError).

use thiserror::Error;

/// Errors that can occur during configuration artifact operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact with this key.
    #[error("Config not found: {owner}/{filename}")]
    ArtifactNotFound {
        /// The requesting owner
        owner: String,
        /// The requested filename
        filename: String,
    },

    /// No object with this identifier.
    #[error("Object not found: {object_id}")]
    ObjectNotFound {
        /// The requested object identifier
        object_id: String,
    },

    /// An artifact with this key already exists.
    #[error("Config already exists: {owner}/{filename}")]
    ArtifactAlreadyExists {
        /// The owner
        owner: String,
        /// The filename
        filename: String,
    },

    /// The object's recorded owner is not the requester.
    #[error("User {requester} is not the owner of object {object_id}")]
    Unauthorized {
        /// The object that was requested
        object_id: String,
        /// The user who asked for it
        requester: String,
    },

    /// An owner or filename cannot be used as a storage key.
    #[error("Invalid {field} {value:?}: {reason}")]
    InvalidKey {
        /// Which part of the key was rejected
        field: &'static str,
        /// The rejected value
        value: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

impl StoreError {
    /// Check if this error indicates the artifact was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ArtifactNotFound { .. } | StoreError::ObjectNotFound { .. }
        )
    }

    /// Check if this error indicates a duplicate key.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::ArtifactAlreadyExists { .. })
    }

    /// Check if this error is an ownership failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized { .. })
    }

    /// Check if this error is a rejected key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, StoreError::InvalidKey { .. })
    }

    pub(crate) fn not_found(owner: &str, filename: &str) -> Self {
        StoreError::ArtifactNotFound {
            owner: owner.to_string(),
            filename: filename.to_string(),
        }
    }

    pub(crate) fn already_exists(owner: &str, filename: &str) -> Self {
        StoreError::ArtifactAlreadyExists {
            owner: owner.to_string(),
            filename: filename.to_string(),
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
