//! Chunk storage for objects.
//!
//! Object content is split into fixed-size chunks numbered from zero. Every
//! chunk except the last is exactly `chunk_size` bytes; empty content has no
//! chunks at all.

use sha2::{Digest, Sha256};

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::sql::{SqlDatabase, SqlxResultExt};

use super::{ObjectId, ObjectMetadata};

/// Hex-encoded SHA-256 of `content`.
pub(crate) fn digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Number of chunks needed for `length` bytes.
pub(crate) fn chunk_count(length: usize, chunk_size: usize) -> usize {
    length.div_ceil(chunk_size)
}

/// Insert the chunks of `content` for `id` inside `tx`.
pub(crate) async fn write(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    id: &ObjectId,
    content: &[u8],
    chunk_size: usize,
) -> Result<()> {
    for (n, chunk) in content.chunks(chunk_size).enumerate() {
        sqlx::query("INSERT INTO object_chunks (object_id, n, data) VALUES ($1, $2, $3)")
            .bind(id.as_str())
            .bind(n as i64)
            .bind(chunk.to_vec())
            .execute(&mut **tx)
            .await
            .sql_context("Failed to write object chunk")?;
    }
    Ok(())
}

/// Delete every chunk of `id` inside `tx`.
pub(crate) async fn delete(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    id: &ObjectId,
) -> Result<()> {
    sqlx::query("DELETE FROM object_chunks WHERE object_id = $1")
        .bind(id.as_str())
        .execute(&mut **tx)
        .await
        .sql_context("Failed to delete object chunks")?;
    Ok(())
}

/// Read and reassemble the content described by `meta`.
///
/// The chunk sequence, total length and digest are all checked against the
/// metadata; any mismatch is an integrity violation.
pub(crate) async fn read(db: &SqlDatabase, meta: &ObjectMetadata) -> Result<Vec<u8>> {
    let rows: Vec<(i64, Vec<u8>)> =
        sqlx::query_as("SELECT n, data FROM object_chunks WHERE object_id = $1 ORDER BY n")
            .bind(meta.id.as_str())
            .fetch_all(db.pool())
            .await
            .sql_context("Failed to read object chunks")?;

    let expected = chunk_count(meta.length, meta.chunk_size);
    if rows.len() != expected {
        return Err(violation(
            &meta.id,
            format!("expected {expected} chunks, found {}", rows.len()),
        ));
    }

    let mut content = Vec::with_capacity(meta.length);
    for (index, (n, data)) in rows.into_iter().enumerate() {
        if n != index as i64 {
            return Err(violation(&meta.id, format!("missing chunk {index}")));
        }
        let is_last = index + 1 == expected;
        if !is_last && data.len() != meta.chunk_size {
            return Err(violation(
                &meta.id,
                format!("chunk {index} has {} bytes", data.len()),
            ));
        }
        content.extend_from_slice(&data);
    }

    if content.len() != meta.length {
        return Err(violation(
            &meta.id,
            format!("expected {} bytes, found {}", meta.length, content.len()),
        ));
    }
    if digest(&content) != meta.sha256 {
        return Err(violation(&meta.id, "content digest mismatch".to_string()));
    }

    Ok(content)
}

fn violation(id: &ObjectId, reason: String) -> crate::Error {
    BackendError::IntegrityViolation {
        object_id: id.to_string(),
        reason,
    }
    .into()
}
