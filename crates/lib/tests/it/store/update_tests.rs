//! Update and replace semantics under failure
//!
//! `update_config` is delete-then-add and loses the artifact when the add
//! fails. `replace_config` only discards the old content once the new content
//! is written. Failures are injected with a wrapping backend for both
//! backends, and with a database trigger for the object backend.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use confvault::{
    ConfigArtifact, ConfigStore, ErrorKind, FileType, Result,
    backend::{ArtifactBackend, ArtifactWrite, BackendKind, FileBackend, ObjectBackend},
};

use crate::helpers::*;

/// Delegates to a real backend, failing writes on demand.
struct FaultyBackend<B> {
    inner: B,
    fail_inserts: AtomicBool,
    fail_replaces: AtomicBool,
}

impl<B> FaultyBackend<B> {
    fn new(inner: B) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_replaces: AtomicBool::new(false),
        }
    }
}

fn injected() -> confvault::Error {
    std::io::Error::other("injected write failure").into()
}

#[async_trait]
impl<B: ArtifactBackend> ArtifactBackend for FaultyBackend<B> {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn insert(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.insert(artifact).await
    }

    async fn replace(&self, artifact: ArtifactWrite<'_>) -> Result<()> {
        if self.fail_replaces.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.replace(artifact).await
    }

    async fn remove(&self, owner: &str, filename: &str) -> Result<()> {
        self.inner.remove(owner, filename).await
    }

    async fn fetch(&self, owner: &str, filename: &str) -> Result<ConfigArtifact> {
        self.inner.fetch(owner, filename).await
    }

    async fn exists(&self, owner: &str, filename: &str) -> Result<bool> {
        self.inner.exists(owner, filename).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn faulty<B: ArtifactBackend>(store: &ConfigStore) -> &FaultyBackend<B> {
    store
        .backend()
        .as_any()
        .downcast_ref::<FaultyBackend<B>>()
        .expect("Store should use the faulty backend")
}

async fn update_loses_artifact_when_add_fails<B: ArtifactBackend>(store: ConfigStore) {
    store
        .add_config("alice", "app.json", FileType::Json, b"original")
        .await
        .unwrap();

    faulty::<B>(&store).fail_inserts.store(true, Ordering::SeqCst);
    let err = store
        .update_config("alice", "app.json", FileType::Json, b"updated")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);

    // The delete half went through, the add half did not
    let err = store.get_config("alice", "app.json").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

async fn replace_keeps_artifact_when_write_fails<B: ArtifactBackend>(store: ConfigStore) {
    store
        .add_config("alice", "app.json", FileType::Json, b"original")
        .await
        .unwrap();

    faulty::<B>(&store).fail_replaces.store(true, Ordering::SeqCst);
    let err = store
        .replace_config("alice", "app.json", FileType::Json, b"updated")
        .await
        .unwrap_err();
    assert!(err.is_backend_failure());

    let artifact = store.get_config("alice", "app.json").await.unwrap();
    assert_eq!(artifact.content, b"original");
}

#[tokio::test]
async fn test_update_not_atomic_object() {
    let store = ConfigStore::new(Box::new(FaultyBackend::new(ObjectBackend::new(
        test_database().await,
    ))));
    update_loses_artifact_when_add_fails::<ObjectBackend>(store).await;
}

#[tokio::test]
async fn test_update_not_atomic_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(Box::new(FaultyBackend::new(FileBackend::new(dir.path()))));
    update_loses_artifact_when_add_fails::<FileBackend>(store).await;
}

#[tokio::test]
async fn test_replace_failure_keeps_original_object() {
    let store = ConfigStore::new(Box::new(FaultyBackend::new(ObjectBackend::new(
        test_database().await,
    ))));
    replace_keeps_artifact_when_write_fails::<ObjectBackend>(store).await;
}

#[tokio::test]
async fn test_replace_failure_keeps_original_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(Box::new(FaultyBackend::new(FileBackend::new(dir.path()))));
    replace_keeps_artifact_when_write_fails::<FileBackend>(store).await;
}

// ===== FAILURES INSIDE THE OBJECT BACKEND =====

/// Make any chunk write whose data is exactly `boom` fail.
///
/// SQLite only; returns false when running against another database.
async fn install_chunk_trap(store: &ConfigStore) -> bool {
    let backend = store
        .backend()
        .as_any()
        .downcast_ref::<ObjectBackend>()
        .expect("Store should use the object backend");
    let db = backend.database();
    if !db.is_sqlite() {
        return false;
    }
    sqlx::query(
        "CREATE TRIGGER chunk_trap BEFORE INSERT ON object_chunks
         WHEN NEW.data = X'626f6f6d'
         BEGIN SELECT RAISE(ABORT, 'injected chunk failure'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();
    true
}

#[tokio::test]
async fn test_replace_rolls_back_partial_write() {
    let (store, _db) = object_store().await;
    if !install_chunk_trap(&store).await {
        return;
    }

    store
        .add_config("alice", "app.txt", FileType::Text, b"original")
        .await
        .unwrap();

    let err = store
        .replace_config("alice", "app.txt", FileType::Text, b"boom")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);

    // Old chunks were deleted inside the transaction; the rollback restores them
    let artifact = store.get_config("alice", "app.txt").await.unwrap();
    assert_eq!(artifact.content, b"original");
}

#[tokio::test]
async fn test_update_partial_write_loses_artifact() {
    let (store, _db) = object_store().await;
    if !install_chunk_trap(&store).await {
        return;
    }

    store
        .add_config("alice", "app.txt", FileType::Text, b"original")
        .await
        .unwrap();

    let err = store
        .update_config("alice", "app.txt", FileType::Text, b"boom")
        .await
        .unwrap_err();
    assert!(err.is_backend_failure());

    // The failed add rolled back its metadata row too, so nothing is left
    assert!(!store.config_exists("alice", "app.txt").await.unwrap());
}

#[tokio::test]
async fn test_failed_add_leaves_no_metadata() {
    let (store, _db) = object_store().await;
    if !install_chunk_trap(&store).await {
        return;
    }

    let err = store
        .add_config("alice", "app.txt", FileType::Text, b"boom")
        .await
        .unwrap_err();
    assert!(err.is_backend_failure());
    assert!(!store.config_exists("alice", "app.txt").await.unwrap());

    // The key is still free
    store
        .add_config("alice", "app.txt", FileType::Text, b"fine")
        .await
        .unwrap();
}
