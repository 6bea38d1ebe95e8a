//! Backend implementations for confvault artifact storage
//!
//! This module provides the [`ArtifactBackend`] trait and its two
//! implementations:
//!
//! - [`ObjectBackend`]: a chunked binary object store inside the SQL database
//! - [`FileBackend`]: plain files in a per-user directory tree
//!
//! The trait lets [`ConfigStore`](crate::store::ConfigStore) stay independent
//! of the storage mechanism. Both implementations honor the same contract and
//! the same error taxonomy, so anything built on the store is backend-agnostic.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::file_type::FileType;
use crate::store::ConfigArtifact;

pub mod errors;
pub mod file;
pub mod object;
pub mod sql;

pub use errors::BackendError;
pub use file::FileBackend;
pub use object::{ObjectBackend, ObjectId, ObjectMetadata};

/// Which persistence strategy a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Chunked objects in the SQL database.
    Object,
    /// Files under a root directory.
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Object => f.write_str("object"),
            BackendKind::File => f.write_str("file"),
        }
    }
}

/// The data written by an insert or replace.
///
/// Keys have already been validated by the store when a backend sees them.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactWrite<'a> {
    pub owner: &'a str,
    pub filename: &'a str,
    pub file_type: FileType,
    pub content: &'a [u8],
}

/// Storage strategy behind a [`ConfigStore`](crate::store::ConfigStore).
///
/// All backends must be `Send` and `Sync` so one instance can serve
/// concurrent requests, and implement `Any` to allow downcasting to the
/// concrete type for backend-specific operations.
#[async_trait]
pub trait ArtifactBackend: Send + Sync + Any {
    /// The kind of this backend.
    fn kind(&self) -> BackendKind;

    /// Store a new artifact.
    ///
    /// Must be atomic with respect to other inserts of the same key: when two
    /// inserts race, exactly one succeeds and the other fails with
    /// `StoreError::ArtifactAlreadyExists`. Never overwrites.
    async fn insert(&self, artifact: ArtifactWrite<'_>) -> Result<()>;

    /// Replace the content and type of an existing artifact.
    ///
    /// The previous content must stay readable until the new content has been
    /// written, and must survive if the write fails. Fails with
    /// `StoreError::ArtifactNotFound` when the key does not exist.
    async fn replace(&self, artifact: ArtifactWrite<'_>) -> Result<()>;

    /// Delete an artifact, failing with `StoreError::ArtifactNotFound` when absent.
    async fn remove(&self, owner: &str, filename: &str) -> Result<()>;

    /// Read an artifact owned by `owner`.
    async fn fetch(&self, owner: &str, filename: &str) -> Result<ConfigArtifact>;

    /// Check whether `owner` has an artifact named `filename`.
    async fn exists(&self, owner: &str, filename: &str) -> Result<bool>;

    /// Returns a reference to the backend as a dynamic `Any` type.
    fn as_any(&self) -> &dyn Any;
}
