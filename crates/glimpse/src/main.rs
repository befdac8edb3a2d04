//! Glimpse CLI - ask questions about images.
//!
//! Glimpse captions an uploaded image with a local BLIP model and answers a
//! question about it with a chat completion model. It runs as an HTTP
//! service or as a one-shot command.
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP service
//! glimpse serve --port 8000
//!
//! # Ask a single question
//! glimpse ask ball.jpg "What color is the object?"
//!
//! # Manage models
//! glimpse models download
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glimpse_core::Config;

mod cli;
mod logging;
mod server;

/// Glimpse - ask questions about images.
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "GLIMPSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve(cli::serve::ServeArgs),

    /// Caption an image and answer one question about it
    Ask(cli::ask::AskArgs),

    /// Manage the captioning model (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already carry the key.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `glimpse config path`."
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Glimpse v{}", glimpse_core::VERSION);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Ask(args) => cli::ask::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, glimpse_core::ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
