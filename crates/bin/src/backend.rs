//! Database and store creation from settings.

use confvault::{
    ConfigStore, SqlDatabase,
    backend::{BackendKind, FileBackend, ObjectBackend},
};

use crate::settings::Settings;

/// Redact credentials from a PostgreSQL connection URL for safe logging
pub fn redact_postgres_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let mut redacted = parsed.clone();
        if !parsed.username().is_empty() {
            let _ = redacted.set_username("***");
        }
        if parsed.password().is_some() {
            let _ = redacted.set_password(Some("***"));
        }
        redacted.to_string()
    } else {
        "postgres://***@<unparsable-url>".to_string()
    }
}

/// A database URL that is safe to log.
pub fn display_database_url(url: &str) -> String {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        redact_postgres_url(url)
    } else {
        url.to_string()
    }
}

/// Connect to the database named by the settings
pub async fn open_database(settings: &Settings) -> Result<SqlDatabase, Box<dyn std::error::Error>> {
    let display_url = display_database_url(&settings.database_url);
    tracing::info!("Connecting to database at {}", display_url);

    match SqlDatabase::connect(&settings.database_url).await {
        Ok(db) => {
            tracing::info!("Connected to database successfully");
            Ok(db)
        }
        Err(e) => Err(format!("Failed to connect to database at {}: {}", display_url, e).into()),
    }
}

/// Create the configuration store for the selected backend
pub async fn create_config_store(
    settings: &Settings,
    db: &SqlDatabase,
) -> Result<ConfigStore, Box<dyn std::error::Error>> {
    match settings.backend_kind() {
        BackendKind::Object => {
            tracing::info!(
                "Using object backend with {} byte chunks",
                settings.chunk_size
            );
            Ok(ConfigStore::new(Box::new(
                ObjectBackend::new(db.clone()).with_chunk_size(settings.chunk_size),
            )))
        }
        BackendKind::File => {
            tracing::info!(
                "Using file backend at {}",
                settings.config_dir.display()
            );
            tokio::fs::create_dir_all(&settings.config_dir).await?;
            Ok(ConfigStore::new(Box::new(FileBackend::new(
                settings.config_dir.clone(),
            ))))
        }
    }
}
