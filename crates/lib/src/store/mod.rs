//! Backend-agnostic configuration artifact store.
//!
//! [`ConfigStore`] is the single entry point for artifact CRUD. It validates
//! keys, then delegates to the [`ArtifactBackend`] chosen when it was built.
//! Callers are expected to have authenticated the owner through
//! [`UserStore`](crate::user::UserStore) first; the store itself trusts the
//! owner it is given.

use std::fmt;
use std::path::PathBuf;

use crate::Result;
use crate::backend::sql::SqlDatabase;
use crate::backend::{ArtifactBackend, ArtifactWrite, BackendKind, FileBackend, ObjectBackend};
use crate::file_type::FileType;

mod errors;
pub use errors::StoreError;

mod types;
pub use types::ConfigArtifact;

/// Configuration artifact store over one backend.
pub struct ConfigStore {
    backend: Box<dyn ArtifactBackend>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("backend", &self.backend.kind())
            .finish()
    }
}

impl ConfigStore {
    /// Create a store over an arbitrary backend.
    pub fn new(backend: Box<dyn ArtifactBackend>) -> Self {
        Self { backend }
    }

    /// Create a store keeping artifacts as chunked objects in `db`.
    pub fn object(db: SqlDatabase) -> Self {
        Self::new(Box::new(ObjectBackend::new(db)))
    }

    /// Create a store keeping artifacts as files under `root`.
    pub fn file(root: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileBackend::new(root)))
    }

    /// Create a store for the backend selected at startup.
    ///
    /// `db` is only used by the object backend and `root` only by the file
    /// backend.
    pub fn from_kind(kind: BackendKind, db: SqlDatabase, root: impl Into<PathBuf>) -> Self {
        match kind {
            BackendKind::Object => Self::object(db),
            BackendKind::File => Self::file(root),
        }
    }

    /// Which backend this store writes to.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// The backend, for downcasting to backend-specific APIs.
    pub fn backend(&self) -> &dyn ArtifactBackend {
        self.backend.as_ref()
    }

    /// Store a new artifact.
    ///
    /// Fails with `AlreadyExists` when `owner` already has an artifact named
    /// `filename`; an existing artifact is never overwritten. Concurrent adds
    /// of one key produce exactly one success.
    pub async fn add_config(
        &self,
        owner: &str,
        filename: &str,
        file_type: FileType,
        content: &[u8],
    ) -> Result<()> {
        validate_key(owner, filename)?;
        self.backend
            .insert(ArtifactWrite {
                owner,
                filename,
                file_type,
                content,
            })
            .await?;
        tracing::debug!(owner, filename, %file_type, length = content.len(), backend = %self.backend.kind(), "Added config");
        Ok(())
    }

    /// Replace an artifact by deleting it and adding it again.
    ///
    /// Fails with `NotFound` when the key does not exist. This is not atomic:
    /// if the add fails after the delete succeeded, the artifact is gone. Use
    /// [`replace_config`](Self::replace_config) to keep the old content on
    /// failure.
    pub async fn update_config(
        &self,
        owner: &str,
        filename: &str,
        file_type: FileType,
        content: &[u8],
    ) -> Result<()> {
        self.delete_config(owner, filename).await?;
        if let Err(e) = self.add_config(owner, filename, file_type, content).await {
            tracing::warn!(owner, filename, error = %e, "Config deleted but re-add failed");
            return Err(e);
        }
        Ok(())
    }

    /// Replace an artifact's content and type in one step.
    ///
    /// The old content is only discarded once the new content is written, so
    /// a failed call leaves the artifact unchanged. `created_at` is preserved
    /// by the object backend. Fails with `NotFound` when the key does not
    /// exist.
    pub async fn replace_config(
        &self,
        owner: &str,
        filename: &str,
        file_type: FileType,
        content: &[u8],
    ) -> Result<()> {
        validate_key(owner, filename)?;
        self.backend
            .replace(ArtifactWrite {
                owner,
                filename,
                file_type,
                content,
            })
            .await?;
        tracing::debug!(owner, filename, %file_type, length = content.len(), "Replaced config");
        Ok(())
    }

    /// Delete an artifact. Fails with `NotFound` when absent.
    pub async fn delete_config(&self, owner: &str, filename: &str) -> Result<()> {
        validate_key(owner, filename)?;
        self.backend.remove(owner, filename).await?;
        tracing::debug!(owner, filename, "Deleted config");
        Ok(())
    }

    /// Read `owner`'s artifact named `filename`.
    ///
    /// The object backend returns the type recorded at write time; the file
    /// backend derives it from the filename extension.
    pub async fn get_config(&self, owner: &str, filename: &str) -> Result<ConfigArtifact> {
        validate_key(owner, filename)?;
        self.backend.fetch(owner, filename).await
    }

    /// Check whether `owner` has an artifact named `filename`.
    pub async fn config_exists(&self, owner: &str, filename: &str) -> Result<bool> {
        validate_key(owner, filename)?;
        self.backend.exists(owner, filename).await
    }
}

/// Reject owners and filenames that are unusable as storage keys.
///
/// Both parts become path components in the file backend, so anything that
/// could escape the owner's directory is refused for every backend.
pub fn validate_key(owner: &str, filename: &str) -> Result<()> {
    check_component("owner", owner)?;
    check_component("filename", filename)
}

fn check_component(field: &'static str, value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value == "." || value == ".." {
        "must not be a relative path"
    } else if value.contains(['/', '\\']) {
        "must not contain a path separator"
    } else if value.contains('\0') {
        "must not contain NUL"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidKey {
        field,
        value: value.to_string(),
        reason,
    }
    .into())
}
