//! Concurrent access to one key
//!
//! Both backends insert with an atomic insert-if-absent primitive, so racing
//! adds of the same key produce exactly one success. Reads that overlap a
//! delete or replace see a complete version or NotFound, never an error.

use std::sync::Arc;

use confvault::{ConfigStore, ErrorKind, FileType, backend::ObjectBackend};

use crate::helpers::*;

const RACERS: usize = 8;

async fn race_adds(store: Arc<ConfigStore>) {
    let mut handles = Vec::new();
    for i in 0..RACERS {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .add_config("alice", "race.json", FileType::Json, format!("{i}").as_bytes())
                .await
        }));
    }

    let mut winners = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await.expect("Task panicked") {
            Ok(()) => winners.push(i),
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists, "unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one add should win");

    // The stored content is the winner's, untouched by the losers
    let artifact = store.get_config("alice", "race.json").await.unwrap();
    assert_eq!(artifact.content, format!("{}", winners[0]).as_bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_file_backend() {
    let (store, _dir) = file_store();
    race_adds(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_object_backend() {
    // A file database so every pooled connection is a real writer
    let (db, _dir) = test_file_database().await;
    race_adds(Arc::new(ConfigStore::object(db))).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_different_keys() {
    let (db, _dir) = test_file_database().await;
    let store = Arc::new(ConfigStore::object(db));

    let mut handles = Vec::new();
    for i in 0..RACERS {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .add_config("alice", &format!("app-{i}.json"), FileType::Json, b"{}")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("Distinct keys should not collide");
    }

    for i in 0..RACERS {
        assert!(
            store
                .config_exists("alice", &format!("app-{i}.json"))
                .await
                .unwrap()
        );
    }
}

const ROUNDS: usize = 60;
const READERS: usize = 3;

/// Content of version `v`: `v` repeated, with a length that also encodes `v`.
fn version(v: usize) -> Vec<u8> {
    vec![v as u8; 4096 + v]
}

fn assert_is_a_version(content: &[u8]) {
    let v = content.len().checked_sub(4096).expect("content too short");
    assert_eq!(content, version(v).as_slice(), "torn read of version {v}");
}

async fn race_reads_with_deletes(store: Arc<ConfigStore>) {
    for round in 0..ROUNDS {
        store
            .add_config("alice", "race.bin", FileType::Text, &version(round % 200))
            .await
            .unwrap();

        let mut readers = Vec::new();
        for _ in 0..READERS {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                store.get_config("alice", "race.bin").await
            }));
        }
        store.delete_config("alice", "race.bin").await.unwrap();

        for reader in readers {
            match reader.await.unwrap() {
                Ok(artifact) => assert_is_a_version(&artifact.content),
                Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound, "round {round}: {e}"),
            }
        }
    }
}

async fn race_reads_with_replaces(store: Arc<ConfigStore>) {
    store
        .add_config("alice", "race.bin", FileType::Text, &version(0))
        .await
        .unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for v in 1..=ROUNDS {
                store
                    .replace_config("alice", "race.bin", FileType::Text, &version(v))
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..READERS {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                let artifact = store
                    .get_config("alice", "race.bin")
                    .await
                    .expect("reads during a replace must succeed");
                assert_is_a_version(&artifact.content);
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let artifact = store.get_config("alice", "race.bin").await.unwrap();
    assert_eq!(artifact.content, version(ROUNDS));
}

/// Small chunks so every version spans several chunk rows
async fn chunked_object_store() -> (ConfigStore, tempfile::TempDir) {
    let (db, dir) = test_file_database().await;
    let backend = ObjectBackend::new(db).with_chunk_size(1024);
    (ConfigStore::new(Box::new(backend)), dir)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_delete_object_backend() {
    let (store, _dir) = chunked_object_store().await;
    race_reads_with_deletes(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_delete_file_backend() {
    let (store, _dir) = file_store();
    race_reads_with_deletes(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_replace_object_backend() {
    let (store, _dir) = chunked_object_store().await;
    race_reads_with_replaces(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_replace_file_backend() {
    let (store, _dir) = file_store();
    race_reads_with_replaces(Arc::new(store)).await;
}

async fn race_reads_with_adds(store: Arc<ConfigStore>) {
    for round in 0..ROUNDS {
        let content = version(round % 200);
        let mut readers = Vec::new();
        for _ in 0..READERS {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                store.get_config("alice", "race.bin").await
            }));
        }
        store
            .add_config("alice", "race.bin", FileType::Text, &content)
            .await
            .unwrap();

        for reader in readers {
            match reader.await.unwrap() {
                Ok(artifact) => assert_eq!(artifact.content, content, "round {round}"),
                Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound, "round {round}: {e}"),
            }
        }
        store.delete_config("alice", "race.bin").await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_add_file_backend() {
    let (store, _dir) = file_store();
    race_reads_with_adds(Arc::new(store)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_add_object_backend() {
    let (store, _dir) = chunked_object_store().await;
    race_reads_with_adds(Arc::new(store)).await;
}
