//! SQL-backed user store.

use std::sync::Arc;

use super::crypto::{hash_password, verify_password};
use super::errors::UserError;
use super::types::User;
use crate::Result;
use crate::backend::sql::{SqlDatabase, SqlxResultExt};
use crate::clock::{Clock, SystemClock};

/// User records and credential checks over the `users` table.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct UserStore {
    db: SqlDatabase,
    clock: Arc<dyn Clock>,
}

impl UserStore {
    /// Create a store over `db` using the system clock.
    pub fn new(db: SqlDatabase) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Create a store over `db` with an explicit clock.
    pub fn with_clock(db: SqlDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// The underlying database.
    pub fn database(&self) -> &SqlDatabase {
        &self.db
    }

    fn now(&self) -> i64 {
        self.clock.now_millis() as i64
    }

    /// Register a new user.
    ///
    /// Fails with `UserError::UserAlreadyExists` when `user_id` is taken.
    /// The check and the insert are one statement, so concurrent registrations
    /// of one id cannot both succeed.
    pub async fn add_user(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<()> {
        validate_user_id(user_id)?;
        let password_hash = hash_password(password)?;
        let now = self.now();

        let result = sqlx::query(
            "INSERT INTO users (user_id, email, name, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .bind(name)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .sql_context("Failed to insert user")?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserAlreadyExists {
                user_id: user_id.to_string(),
            }
            .into());
        }

        tracing::info!(user_id, "Created user");
        Ok(())
    }

    /// Replace a user's email, name and secret.
    ///
    /// Fails with `UserError::UserNotFound` when no such user exists.
    pub async fn update_user(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<()> {
        validate_user_id(user_id)?;
        let password_hash = hash_password(password)?;

        let result = sqlx::query(
            "UPDATE users SET email = $1, name = $2, password_hash = $3, updated_at = $4
             WHERE user_id = $5",
        )
        .bind(email)
        .bind(name)
        .bind(&password_hash)
        .bind(self.now())
        .bind(user_id)
        .execute(self.db.pool())
        .await
        .sql_context("Failed to update user")?;

        if result.rows_affected() == 0 {
            return Err(not_found(user_id));
        }

        tracing::debug!(user_id, "Updated user");
        Ok(())
    }

    /// Remove a user.
    ///
    /// The user's artifacts are left in place. Fails with
    /// `UserError::UserNotFound` when no such user exists.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;

        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .sql_context("Failed to delete user")?;

        if result.rows_affected() == 0 {
            return Err(not_found(user_id));
        }

        tracing::info!(user_id, "Deleted user");
        Ok(())
    }

    /// Check a user's secret.
    ///
    /// Returns `Ok(true)` when the secret matches. Fails with
    /// `UserError::UserNotFound` for an unknown user and
    /// `UserError::InvalidCredential` on a mismatch.
    pub async fn authenticate_user(&self, user_id: &str, password: &str) -> Result<bool> {
        validate_user_id(user_id)?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await
                .sql_context("Failed to read credential")?;

        let Some((password_hash,)) = row else {
            return Err(not_found(user_id));
        };

        if !verify_password(user_id, password, &password_hash)? {
            tracing::warn!(user_id, "Rejected credential");
            return Err(UserError::InvalidCredential {
                user_id: user_id.to_string(),
            }
            .into());
        }

        Ok(true)
    }

    /// Read a user's profile.
    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        validate_user_id(user_id)?;

        let row: Option<(String, String, String, i64, i64)> = sqlx::query_as(
            "SELECT user_id, email, name, created_at, updated_at FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await
        .sql_context("Failed to read user")?;

        let (user_id, email, name, created_at, updated_at) =
            row.ok_or_else(|| not_found(user_id))?;
        Ok(User {
            user_id,
            email,
            name,
            created_at: created_at.max(0) as u64,
            updated_at: updated_at.max(0) as u64,
        })
    }

    /// Check whether a user is registered.
    pub async fn user_exists(&self, user_id: &str) -> Result<bool> {
        validate_user_id(user_id)?;

        let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await
            .sql_context("Failed to look up user")?;
        Ok(row.is_some())
    }
}

fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(UserError::InvalidUserId {
            user_id: user_id.to_string(),
            reason: "must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn not_found(user_id: &str) -> crate::Error {
    UserError::UserNotFound {
        user_id: user_id.to_string(),
    }
    .into()
}
