//! Filesystem artifact backend.
//!
//! Artifacts live at `<root>/<owner>/<filename>` as raw content with no
//! sidecar metadata. The file type is never persisted; it is derived from the
//! filename extension on every read. Ownership is enforced by directory
//! scoping alone, which relies on the store rejecting owners and filenames
//! that contain path separators.

use std::any::Any;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{ArtifactBackend, ArtifactWrite, BackendKind};
use crate::file_type::FileType;
use crate::store::{ConfigArtifact, StoreError};

/// Artifact backend storing plain files under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `owner`'s artifacts.
    pub fn user_dir(&self, owner: &str) -> PathBuf {
        self.root.join(owner)
    }

    /// Path of `owner`'s artifact named `filename`.
    pub fn artifact_path(&self, owner: &str, filename: &str) -> PathBuf {
        self.user_dir(owner).join(filename)
    }

    /// A fresh temp file path next to the artifact.
    fn temp_path(&self, owner: &str, filename: &str) -> PathBuf {
        self.user_dir(owner).join(format!(
            ".{}.{}.tmp",
            filename,
            uuid::Uuid::new_v4().simple()
        ))
    }

    async fn ensure_user_dir(&self, owner: &str) -> Result<PathBuf> {
        let dir = self.user_dir(owner);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| BackendError::file_io(&dir, e))?;
        Ok(dir)
    }
}

/// Write `content` to an open file and flush it to disk.
async fn write_and_sync(file: &mut fs::File, content: &[u8]) -> std::io::Result<()> {
    file.write_all(content).await?;
    file.sync_all().await
}

/// Write `content` to a new file at `tmp`, removing it again on failure.
async fn write_temp(tmp: &Path, content: &[u8]) -> Result<()> {
    let written = async {
        let mut file = fs::File::create(tmp).await?;
        write_and_sync(&mut file, content).await
    }
    .await;
    if let Err(e) = written {
        discard(tmp).await;
        return Err(BackendError::file_io(tmp, e).into());
    }
    Ok(())
}

/// Best-effort removal of a partially written file.
async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != IoErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial file");
    }
}

fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl ArtifactBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn insert(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        self.ensure_user_dir(artifact.owner).await?;
        let path = self.artifact_path(artifact.owner, artifact.filename);
        let tmp = self.temp_path(artifact.owner, artifact.filename);
        write_temp(&tmp, artifact.content).await?;

        // hard_link fails if the target exists, so two racing inserts cannot
        // both succeed, and readers only ever see the complete file.
        let linked = fs::hard_link(&tmp, &path).await;
        discard(&tmp).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                return Err(StoreError::already_exists(artifact.owner, artifact.filename).into());
            }
            Err(e) => return Err(BackendError::file_io(&path, e).into()),
        }

        tracing::debug!(path = %path.display(), length = artifact.content.len(), "Wrote config file");
        Ok(())
    }

    async fn replace(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        let path = self.artifact_path(artifact.owner, artifact.filename);
        if !self.exists(artifact.owner, artifact.filename).await? {
            return Err(StoreError::not_found(artifact.owner, artifact.filename).into());
        }

        let tmp = self.temp_path(artifact.owner, artifact.filename);
        write_temp(&tmp, artifact.content).await?;

        // rename replaces the destination atomically; readers see either the
        // old file or the new one.
        if let Err(e) = fs::rename(&tmp, &path).await {
            discard(&tmp).await;
            return Err(BackendError::file_io(&path, e).into());
        }

        tracing::debug!(path = %path.display(), length = artifact.content.len(), "Replaced config file");
        Ok(())
    }

    async fn remove(&self, owner: &str, filename: &str) -> Result<()> {
        let path = self.artifact_path(owner, filename);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted config file");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(StoreError::not_found(owner, filename).into())
            }
            Err(e) => Err(BackendError::file_io(&path, e).into()),
        }
    }

    async fn fetch(&self, owner: &str, filename: &str) -> Result<ConfigArtifact> {
        let path = self.artifact_path(owner, filename);
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(StoreError::not_found(owner, filename).into());
            }
            Err(e) => return Err(BackendError::file_io(&path, e).into()),
        };

        // Content and timestamps both come from the open handle, which stays
        // valid if the path is deleted or replaced meanwhile.
        let metadata = file
            .metadata()
            .await
            .map_err(|e| BackendError::file_io(&path, e))?;
        let mut content = Vec::with_capacity(metadata.len() as usize);
        file.read_to_end(&mut content)
            .await
            .map_err(|e| BackendError::file_io(&path, e))?;

        let updated_at = metadata.modified().map(millis).unwrap_or(0);
        let created_at = metadata.created().map(millis).unwrap_or(updated_at);

        Ok(ConfigArtifact {
            owner: owner.to_string(),
            filename: filename.to_string(),
            file_type: FileType::from_filename(filename),
            content,
            created_at,
            updated_at,
        })
    }

    async fn exists(&self, owner: &str, filename: &str) -> Result<bool> {
        let path = self.artifact_path(owner, filename);
        fs::try_exists(&path)
            .await
            .map_err(|e| BackendError::file_io(&path, e).into())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
