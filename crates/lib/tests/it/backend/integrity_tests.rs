//! Object integrity checks
//!
//! Stored chunks are verified against the metadata row on every read. Any
//! tampering surfaces as a backend failure flagged as an integrity error,
//! never as silently wrong content.

use confvault::{ConfigStore, ErrorKind, FileType, backend::ObjectBackend};

use crate::helpers::*;

/// Store `content` in 4-byte chunks and return the store with the object id.
async fn stored(content: &[u8]) -> (ConfigStore, String) {
    let store = object_store_with(test_clock(), 4).await;
    store
        .add_config("alice", "app.txt", FileType::Text, content)
        .await
        .unwrap();
    let id = backend(&store)
        .find_id("alice", "app.txt")
        .await
        .unwrap()
        .unwrap();
    (store, id.as_str().to_string())
}

fn backend(store: &ConfigStore) -> &ObjectBackend {
    store
        .backend()
        .as_any()
        .downcast_ref::<ObjectBackend>()
        .unwrap()
}

async fn execute(store: &ConfigStore, sql: &str, id: &str) {
    sqlx::query(sql)
        .bind(id)
        .execute(backend(store).database().pool())
        .await
        .unwrap();
}

async fn assert_integrity_failure(store: &ConfigStore) {
    let err = store.get_config("alice", "app.txt").await.unwrap_err();
    assert!(err.is_integrity_error(), "expected integrity error, got {err}");
    assert_eq!(err.kind(), ErrorKind::BackendFailure);
}

#[tokio::test]
async fn test_untouched_object_reads_back() {
    let (store, _id) = stored(b"0123456789").await;
    assert_eq!(
        store.get_config("alice", "app.txt").await.unwrap().content,
        b"0123456789"
    );
}

#[tokio::test]
async fn test_tampered_chunk_detected() {
    let (store, id) = stored(b"0123456789").await;
    sqlx::query("UPDATE object_chunks SET data = $1 WHERE object_id = $2 AND n = 1")
        .bind(b"XXXX".to_vec())
        .bind(id.as_str())
        .execute(backend(&store).database().pool())
        .await
        .unwrap();

    assert_integrity_failure(&store).await;
}

#[tokio::test]
async fn test_missing_chunk_detected() {
    let (store, id) = stored(b"0123456789").await;
    execute(
        &store,
        "DELETE FROM object_chunks WHERE object_id = $1 AND n = 1",
        &id,
    )
    .await;

    assert_integrity_failure(&store).await;
}

#[tokio::test]
async fn test_truncated_last_chunk_detected() {
    let (store, id) = stored(b"0123456789").await;
    sqlx::query("UPDATE object_chunks SET data = $1 WHERE object_id = $2 AND n = 2")
        .bind(b"8".to_vec())
        .bind(id.as_str())
        .execute(backend(&store).database().pool())
        .await
        .unwrap();

    assert_integrity_failure(&store).await;
}

#[tokio::test]
async fn test_extra_chunk_detected() {
    let (store, id) = stored(b"01234567").await;
    sqlx::query("INSERT INTO object_chunks (object_id, n, data) VALUES ($1, 2, $2)")
        .bind(id.as_str())
        .bind(b"junk".to_vec())
        .execute(backend(&store).database().pool())
        .await
        .unwrap();

    assert_integrity_failure(&store).await;
}

#[tokio::test]
async fn test_digest_mismatch_detected() {
    let (store, id) = stored(b"0123456789").await;
    execute(
        &store,
        "UPDATE objects SET sha256 = 'not-the-digest' WHERE id = $1",
        &id,
    )
    .await;

    assert_integrity_failure(&store).await;
}

#[tokio::test]
async fn test_corrupt_metadata_rejected() {
    let (store, id) = stored(b"0123456789").await;
    execute(&store, "UPDATE objects SET length = -1 WHERE id = $1", &id).await;

    let err = store.get_config("alice", "app.txt").await.unwrap_err();
    assert!(err.is_backend_failure());
}
