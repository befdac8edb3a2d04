//! The `glimpse ask` command: answer one question about a local image.

use std::path::PathBuf;

use clap::Args;
use glimpse_core::{AskService, Config};

/// Arguments for the `ask` command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Image file to caption
    pub image: PathBuf,

    /// Question about the image
    pub question: String,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Execute the ask command.
///
/// Runs the same pipeline as `POST /ask` and prints the outcome as JSON.
pub async fn execute(args: AskArgs, config: Config) -> anyhow::Result<()> {
    let service = AskService::from_config(&config).await;
    let outcome = service
        .ask_file(&args.image, &args.question)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {e}", args.image.display()))?;

    let json = if args.compact {
        serde_json::to_string(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome)?
    };
    println!("{json}");

    Ok(())
}
