//! Artifact types returned by the configuration store.

use serde::{Deserialize, Serialize};

use crate::clock::millis_to_rfc3339;
use crate::file_type::FileType;

/// A stored configuration artifact.
///
/// Keyed by `(owner, filename)`; at most one exists per key in a given
/// backend. Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigArtifact {
    /// The user who owns the artifact
    pub owner: String,
    pub filename: String,
    /// The stored type for object-backed artifacts, or the type derived from
    /// the extension for file-backed ones.
    pub file_type: FileType,
    pub content: Vec<u8>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ConfigArtifact {
    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the artifact has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// `updated_at` as an RFC 3339 string.
    pub fn updated_at_rfc3339(&self) -> String {
        millis_to_rfc3339(self.updated_at)
    }
}
