//! CLI argument definitions for the confvault binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use confvault::backend::BackendKind;

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Artifact storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Chunked objects in the SQL database
    Object,
    /// Plain files under the config directory
    File,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Object => BackendKind::Object,
            Backend::File => BackendKind::File,
        }
    }
}

/// Per-user configuration artifact server
#[derive(Parser, Debug)]
#[command(name = "confvault")]
#[command(about = "confvault: per-user configuration artifact server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The command to run, `serve` when none was given.
    pub fn command_or_serve(self) -> Commands {
        self.command.unwrap_or_else(|| {
            // Parsing the bare subcommand applies defaults and environment
            // overrides the same way an explicit `serve` would.
            Cli::parse_from(["confvault", "serve"])
                .command
                .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the confvault server
    Serve(ServeArgs),
    /// Check health of a running confvault server
    Health(HealthArgs),
}

/// Arguments for the serve command
///
/// Every flag overrides the matching key of the settings file.
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// YAML settings file. A missing file means built-in defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "CONFVAULT_CONFIG")]
    pub config: PathBuf,

    /// Database URL (sqlite:... or postgres://...)
    #[arg(long, env = "CONFVAULT_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Bind address
    #[arg(long, env = "CONFVAULT_HOST")]
    pub host: Option<String>,

    /// HTTP port to listen on
    #[arg(short = 'p', long, env = "CONFVAULT_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Artifact storage backend
    #[arg(short, long, env = "CONFVAULT_BACKEND")]
    pub backend: Option<Backend>,

    /// Root directory for the file backend
    #[arg(short = 'D', long, env = "CONFVAULT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Chunk size in bytes for the object backend
    #[arg(long, env = "CONFVAULT_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            database_url: None,
            host: None,
            http_port: None,
            backend: None,
            config_dir: None,
            chunk_size: None,
        }
    }
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Base URL of the server to check
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "CONFVAULT_URL")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
