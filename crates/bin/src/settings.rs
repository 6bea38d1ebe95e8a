//! Server settings: a YAML file with command-line overrides.
//!
//! ```yaml
//! database_url: "sqlite:confvault.db?mode=rwc"
//! bind:
//!   host: "0.0.0.0"
//!   http: 8080
//! use_file: false
//! config_dir: "configurations"
//! chunk_size: 261120
//! ```
//!
//! Every key is optional. Settings are loaded once at startup and passed down
//! by value.

use std::path::{Path, PathBuf};

use confvault::backend::{BackendKind, object::DEFAULT_CHUNK_SIZE};
use serde::Deserialize;

use crate::cli::ServeArgs;

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindSettings {
    pub host: String,
    /// HTTP port
    pub http: u16,
}

impl Default for BindSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http: 8080,
        }
    }
}

/// Resolved server settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database holding users, and objects when the object backend is used
    pub database_url: String,
    pub bind: BindSettings,
    /// Store artifacts as files instead of chunked objects
    pub use_file: bool,
    /// Root directory of the file backend
    pub config_dir: PathBuf,
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:confvault.db?mode=rwc".to_string(),
            bind: BindSettings::default(),
            use_file: false,
            config_dir: PathBuf::from("configurations"),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to null rather than an empty map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Load settings from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let settings = Self::from_yaml(&text)
                    .map_err(|e| format!("Invalid settings file {}: {e}", path.display()))?;
                tracing::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(format!("Cannot read settings file {}: {e}", path.display()).into()),
        }
    }

    /// Apply command-line and environment overrides.
    pub fn apply_overrides(&mut self, args: &ServeArgs) {
        if let Some(url) = &args.database_url {
            self.database_url = url.clone();
        }
        if let Some(host) = &args.host {
            self.bind.host = host.clone();
        }
        if let Some(port) = args.http_port {
            self.bind.http = port;
        }
        if let Some(backend) = args.backend {
            self.use_file = BackendKind::from(backend) == BackendKind::File;
        }
        if let Some(dir) = &args.config_dir {
            self.config_dir = dir.clone();
        }
        if let Some(chunk_size) = args.chunk_size {
            self.chunk_size = chunk_size;
        }
    }

    /// The artifact backend selected by these settings.
    pub fn backend_kind(&self) -> BackendKind {
        if self.use_file {
            BackendKind::File
        } else {
            BackendKind::Object
        }
    }

    /// `host:port` for the HTTP listener.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind.host, self.bind.http)
    }
}
