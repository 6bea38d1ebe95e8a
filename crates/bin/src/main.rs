use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod commands {
    pub mod health;
    pub mod serve;
}
mod settings;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("confvault=info")),
        )
        .init();

    match Cli::parse().command_or_serve() {
        Commands::Serve(args) => commands::serve::run(&args).await,
        Commands::Health(args) => commands::health::run(&args).await,
    }
}
