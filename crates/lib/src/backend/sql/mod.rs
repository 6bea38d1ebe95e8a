//! SQL database handle shared by the user store and the object backend.
//!
//! ## Available Databases
//!
//! - **SQLite**: embedded database, file-backed or in-memory
//! - **PostgreSQL**: server database
//!
//! ## Architecture
//!
//! The handle wraps a sqlx `AnyPool`, so the same queries run against either
//! database. Cloning a [`SqlDatabase`] clones the pool handle, not the
//! connections; every clone talks to the same database.
//!
//! ## Schema
//!
//! The schema is defined in the [`schema`] module and initialized when
//! connecting.

/// Schema definition and version tracking.
pub mod schema;

use std::time::Duration;

use sqlx::AnyPool;
use sqlx::Executor;
use sqlx::any::AnyPoolOptions;

use crate::Result;
use crate::backend::errors::BackendError;

/// Extension trait for sqlx Result types to simplify error handling.
///
/// Adds a method to convert sqlx errors to `BackendError::SqlxError` with a
/// context message.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to BackendError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Database kind for SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    /// SQLite database
    Sqlite,
    /// PostgreSQL database
    Postgres,
}

/// Connection pool to the confvault database.
#[derive(Debug, Clone)]
pub struct SqlDatabase {
    pool: AnyPool,
    kind: DbKind,
}

impl SqlDatabase {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database kind.
    pub fn kind(&self) -> DbKind {
        self.kind
    }

    /// Check if this database is SQLite.
    pub fn is_sqlite(&self) -> bool {
        self.kind == DbKind::Sqlite
    }

    /// Check if this database is PostgreSQL.
    pub fn is_postgres(&self) -> bool {
        self.kind == DbKind::Postgres
    }

    /// Connect using a URL, picking the dialect from its scheme.
    ///
    /// `sqlite:` URLs go through [`connect_sqlite`](Self::connect_sqlite),
    /// `postgres://` and `postgresql://` through
    /// [`connect_postgres`](Self::connect_postgres).
    pub async fn connect(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Self::connect_sqlite(url).await
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url).await
        } else {
            Err(BackendError::SqlxError {
                reason: "Unsupported database URL scheme, expected sqlite: or postgres://"
                    .to_string(),
                source: None,
            }
            .into())
        }
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Open a SQLite database at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    pub async fn open_sqlite<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        // mode=rwc: read-write-create (create file if it doesn't exist)
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect_sqlite(&url).await
    }

    /// Connect to a SQLite database using a connection URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite:./confvault.db")
    ///
    /// A private in-memory URL (`sqlite::memory:`) would give every pooled
    /// connection its own empty database, so it is opened as
    /// [`sqlite_in_memory`](Self::sqlite_in_memory) instead.
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        if is_private_memory_url(url) {
            return Self::sqlite_in_memory().await;
        }

        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // busy_timeout is per connection, so it is applied to every pooled
        // connection as it opens. WAL lets readers proceed while a writer holds
        // the lock; it does not apply to in-memory databases.
        let pragmas = if is_in_memory {
            "PRAGMA busy_timeout = 5000;"
        } else {
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;"
        };

        let mut pool_options = AnyPoolOptions::new().max_connections(5);
        if is_in_memory {
            // An in-memory SQLite database disappears with its last
            // connection, so the pool must keep one open for the lifetime of
            // the handle.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(pragmas).await?;
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to SQLite")?;

        let db = Self {
            pool,
            kind: DbKind::Sqlite,
        };
        schema::initialize(&db).await?;
        Ok(db)
    }

    /// Create an in-memory SQLite database.
    ///
    /// The database exists only for the lifetime of this handle and its clones.
    /// Useful for testing.
    pub async fn sqlite_in_memory() -> Result<Self> {
        // Shared cache so every pooled connection sees the same database; a
        // unique name per instance keeps tests apart.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url).await
    }

    /// Connect to a PostgreSQL database using a connection URL.
    ///
    /// Uses the default (public) schema.
    pub async fn connect_postgres(url: &str) -> Result<Self> {
        Self::connect_postgres_with_schema(url, None).await
    }

    /// Connect to a PostgreSQL database with its own freshly created schema.
    ///
    /// Each handle gets a unique schema, so parallel tests do not see each
    /// other's rows.
    pub async fn connect_postgres_isolated(url: &str) -> Result<Self> {
        // PostgreSQL schema names must start with a letter and be lowercase
        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        Self::connect_postgres_with_schema(url, Some(format!("test_{unique_id}"))).await
    }

    async fn connect_postgres_with_schema(url: &str, schema_name: Option<String>) -> Result<Self> {
        sqlx::any::install_default_drivers();

        if let Some(ref schema) = schema_name {
            let temp_pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .sql_context("Failed to connect to PostgreSQL")?;

            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                .execute(&temp_pool)
                .await
                .sql_context(&format!("Failed to create schema {schema}"))?;

            temp_pool.close().await;
        }

        let is_isolated = schema_name.is_some();
        let schema_for_hook = schema_name.clone();
        let mut pool_options = AnyPoolOptions::new();
        if is_isolated {
            pool_options = pool_options
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(30));
        } else {
            pool_options = pool_options.max_connections(5);
        }

        let pool = pool_options
            .after_connect(move |conn, _meta| {
                let schema = schema_for_hook.clone();
                Box::pin(async move {
                    if let Some(ref s) = schema {
                        let set_path = format!("SET search_path TO {s}");
                        conn.execute(set_path.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        let db = Self {
            pool,
            kind: DbKind::Postgres,
        };
        schema::initialize(&db).await?;
        Ok(db)
    }
}

/// `sqlite::memory:` and `sqlite://:memory:`, with or without options.
fn is_private_memory_url(url: &str) -> bool {
    let rest = url.trim_start_matches("sqlite:").trim_start_matches("//");
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);
    path == ":memory:"
}
