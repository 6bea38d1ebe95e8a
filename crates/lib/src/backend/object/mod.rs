//! Chunked binary object backend.
//!
//! Each artifact is stored as one row in `objects` (its metadata: filename,
//! owner, type, length, chunk size, digest and timestamps) plus its content
//! split across `object_chunks`. Objects are found by a `(filename, owner)`
//! metadata query; the object id is internal and never handed to transports.
//!
//! Reads re-fetch the metadata by id and compare the recorded owner with the
//! requester before any content is returned, so a leaked or reused id cannot
//! be used to read another user's object.

mod chunks;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::sql::{SqlDatabase, SqlxResultExt};
use crate::backend::{ArtifactBackend, ArtifactWrite, BackendKind};
use crate::clock::{Clock, SystemClock};
use crate::file_type::FileType;
use crate::store::{ConfigArtifact, StoreError};

/// Default chunk size, 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Reads of an object that keeps changing underneath give up after this many tries.
const READ_ATTEMPTS: usize = 16;

/// Identifier of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata row of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub id: ObjectId,
    pub filename: String,
    pub owner_id: String,
    pub file_type: FileType,
    pub length: usize,
    pub chunk_size: usize,
    /// Hex-encoded SHA-256 of the content
    pub sha256: String,
    pub created_at: u64,
    pub updated_at: u64,
}

type MetadataRow = (String, String, String, i64, i64, i64, String, i64, i64);

impl ObjectMetadata {
    fn from_row(row: MetadataRow) -> Result<Self> {
        let (id, filename, owner_id, file_type, length, chunk_size, sha256, created, updated) = row;
        let chunk_size = to_usize("chunk_size", chunk_size)?;
        if chunk_size == 0 {
            return Err(BackendError::InvalidStoredValue {
                field: "chunk_size",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        Ok(Self {
            id: ObjectId(id),
            filename,
            owner_id,
            file_type: FileType::from_code(file_type),
            length: to_usize("length", length)?,
            chunk_size,
            sha256,
            created_at: to_u64("created_at", created)?,
            updated_at: to_u64("updated_at", updated)?,
        })
    }
}

fn to_usize(field: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        BackendError::InvalidStoredValue {
            field,
            reason: format!("{value} is out of range"),
        }
        .into()
    })
}

fn to_u64(field: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        BackendError::InvalidStoredValue {
            field,
            reason: format!("{value} is out of range"),
        }
        .into()
    })
}

/// Artifact backend storing chunked objects in the SQL database.
#[derive(Debug, Clone)]
pub struct ObjectBackend {
    db: SqlDatabase,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl ObjectBackend {
    /// Create a backend over `db` using the system clock.
    pub fn new(db: SqlDatabase) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Create a backend over `db` with an explicit clock.
    pub fn with_clock(db: SqlDatabase, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use `chunk_size` bytes per chunk for objects written from now on.
    ///
    /// Existing objects keep the chunk size recorded in their metadata.
    /// A size of zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The chunk size used for new writes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The underlying database.
    pub fn database(&self) -> &SqlDatabase {
        &self.db
    }

    /// Look up the id of `owner`'s object named `filename`.
    pub async fn find_id(&self, owner: &str, filename: &str) -> Result<Option<ObjectId>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM objects WHERE filename = $1 AND owner_id = $2")
                .bind(filename)
                .bind(owner)
                .fetch_optional(self.db.pool())
                .await
                .sql_context("Failed to look up object")?;
        Ok(row.map(|(id,)| ObjectId(id)))
    }

    /// Fetch the metadata of an object by id.
    pub async fn metadata(&self, id: &ObjectId) -> Result<Option<ObjectMetadata>> {
        let row: Option<MetadataRow> = sqlx::query_as(
            "SELECT id, filename, owner_id, file_type, length, chunk_size, sha256, created_at, updated_at
             FROM objects WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(self.db.pool())
        .await
        .sql_context("Failed to read object metadata")?;
        row.map(ObjectMetadata::from_row).transpose()
    }

    /// Read an object by id on behalf of `requester`.
    ///
    /// Fails with `StoreError::Unauthorized` when the recorded owner is not
    /// `requester`, regardless of how the id was obtained.
    ///
    /// Metadata and chunks are read by separate statements. When the chunks
    /// do not match, the metadata is read again: a changed row means a
    /// concurrent replace committed in between and the read is retried, a
    /// missing row means the object was deleted.
    pub async fn open_by_id(&self, requester: &str, id: &ObjectId) -> Result<ConfigArtifact> {
        let not_found = || StoreError::ObjectNotFound {
            object_id: id.to_string(),
        };
        let mut meta = self.metadata(id).await?.ok_or_else(not_found)?;
        let mut attempt = 1;

        loop {
            if meta.owner_id != requester {
                tracing::warn!(object_id = %id, requester, "Rejected read of object owned by another user");
                return Err(StoreError::Unauthorized {
                    object_id: id.to_string(),
                    requester: requester.to_string(),
                }
                .into());
            }

            let err = match chunks::read(&self.db, &meta).await {
                Ok(content) => {
                    return Ok(ConfigArtifact {
                        owner: meta.owner_id,
                        filename: meta.filename,
                        file_type: meta.file_type,
                        content,
                        created_at: meta.created_at,
                        updated_at: meta.updated_at,
                    });
                }
                Err(e) if e.is_integrity_error() => e,
                Err(e) => return Err(e),
            };

            match self.metadata(id).await? {
                None => {
                    tracing::debug!(object_id = %id, "Object deleted during read");
                    return Err(not_found().into());
                }
                Some(current) if current != meta && attempt < READ_ATTEMPTS => {
                    tracing::debug!(object_id = %id, attempt, "Object changed during read, retrying");
                    meta = current;
                    attempt += 1;
                }
                Some(_) => {
                    tracing::warn!(object_id = %id, error = %err, "Object failed integrity check");
                    return Err(err);
                }
            }
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_millis() as i64
    }
}

/// Commit `tx` when `outcome` is a success, otherwise roll it back and
/// return the original error.
async fn finish(tx: sqlx::Transaction<'static, sqlx::Any>, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => tx.commit().await.sql_context("Failed to commit transaction"),
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

/// Look up an object id inside a transaction.
async fn find_id_in(
    tx: &mut sqlx::Transaction<'static, sqlx::Any>,
    owner: &str,
    filename: &str,
) -> Result<Option<ObjectId>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM objects WHERE filename = $1 AND owner_id = $2")
            .bind(filename)
            .bind(owner)
            .fetch_optional(&mut **tx)
            .await
            .sql_context("Failed to look up object")?;
    Ok(row.map(|(id,)| ObjectId(id)))
}

#[async_trait]
impl ArtifactBackend for ObjectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Object
    }

    async fn insert(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        let id = ObjectId::generate();
        let now = self.now();

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;

        let outcome = async {
            let inserted = sqlx::query(
                "INSERT INTO objects (id, filename, owner_id, file_type, length, chunk_size, sha256, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (owner_id, filename) DO NOTHING",
            )
            .bind(id.as_str())
            .bind(artifact.filename)
            .bind(artifact.owner)
            .bind(artifact.file_type.code())
            .bind(artifact.content.len() as i64)
            .bind(self.chunk_size as i64)
            .bind(chunks::digest(artifact.content))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .sql_context("Failed to insert object")?;

            if inserted.rows_affected() == 0 {
                return Err(StoreError::already_exists(artifact.owner, artifact.filename).into());
            }

            chunks::write(&mut tx, &id, artifact.content, self.chunk_size).await
        }
        .await;
        finish(tx, outcome).await?;

        tracing::debug!(object_id = %id, owner = artifact.owner, filename = artifact.filename, length = artifact.content.len(), "Stored object");
        Ok(())
    }

    async fn replace(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;

        let outcome = async {
            let id = find_id_in(&mut tx, artifact.owner, artifact.filename)
                .await?
                .ok_or_else(|| StoreError::not_found(artifact.owner, artifact.filename))?;

            chunks::delete(&mut tx, &id).await?;
            chunks::write(&mut tx, &id, artifact.content, self.chunk_size).await?;

            sqlx::query(
                "UPDATE objects SET file_type = $1, length = $2, chunk_size = $3, sha256 = $4, updated_at = $5
                 WHERE id = $6",
            )
            .bind(artifact.file_type.code())
            .bind(artifact.content.len() as i64)
            .bind(self.chunk_size as i64)
            .bind(chunks::digest(artifact.content))
            .bind(self.now())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .sql_context("Failed to update object metadata")?;
            Ok::<_, crate::Error>(id)
        }
        .await;

        let id = match outcome {
            Ok(id) => {
                finish(tx, Ok(())).await?;
                id
            }
            Err(e) => return finish(tx, Err(e)).await,
        };

        tracing::debug!(object_id = %id, owner = artifact.owner, filename = artifact.filename, "Replaced object");
        Ok(())
    }

    async fn remove(&self, owner: &str, filename: &str) -> Result<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;

        let outcome = async {
            let id = find_id_in(&mut tx, owner, filename)
                .await?
                .ok_or_else(|| StoreError::not_found(owner, filename))?;

            chunks::delete(&mut tx, &id).await?;
            sqlx::query("DELETE FROM objects WHERE id = $1")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .sql_context("Failed to delete object")?;
            Ok::<_, crate::Error>(id)
        }
        .await;

        let id = match outcome {
            Ok(id) => {
                finish(tx, Ok(())).await?;
                id
            }
            Err(e) => return finish(tx, Err(e)).await,
        };

        tracing::debug!(object_id = %id, owner, filename, "Deleted object");
        Ok(())
    }

    async fn fetch(&self, owner: &str, filename: &str) -> Result<ConfigArtifact> {
        let id = self
            .find_id(owner, filename)
            .await?
            .ok_or_else(|| StoreError::not_found(owner, filename))?;
        self.open_by_id(owner, &id).await.map_err(|e| {
            if e.is_not_found() {
                StoreError::not_found(owner, filename).into()
            } else {
                e
            }
        })
    }

    async fn exists(&self, owner: &str, filename: &str) -> Result<bool> {
        Ok(self.find_id(owner, filename).await?.is_some())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
