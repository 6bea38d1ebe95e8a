//! Core data types for the user store

use serde::{Deserialize, Serialize};

/// A registered user.
///
/// The credential hash stays inside the store and is never part of this
/// value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier (login name and artifact owner)
    pub user_id: String,

    pub email: String,

    /// Display name
    pub name: String,

    /// Creation timestamp (milliseconds since Unix epoch)
    pub created_at: u64,

    /// Last update timestamp (milliseconds since Unix epoch)
    pub updated_at: u64,
}
