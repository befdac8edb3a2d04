//! The `glimpse models` command for managing the captioning model.

use clap::{Args, Subcommand};
use glimpse_core::captioning::download::{download_model, model_files};
use glimpse_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the BLIP captioning model (vision encoder + text decoder + tokenizer)
    Download,

    /// List model files and whether they are installed
    List,

    /// Show model directory path
    Path,
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    let model_dir = config.captioning_model_dir();

    match args.command {
        ModelsCommand::Download => {
            tracing::info!(
                "Downloading {} from {}...",
                config.captioning.model,
                config.captioning.repo
            );
            let client = reqwest::Client::new();
            download_model(&client, &config.captioning, &model_dir).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            println!("Captioning model: {}", config.captioning.model);
            println!("  Repository: {}", config.captioning.repo);
            println!("  Directory:  {}\n", model_dir.display());

            let mut missing = 0;
            for file in model_files(&config.captioning) {
                let path = model_dir.join(file.local);
                let status = match std::fs::metadata(&path) {
                    Ok(meta) => format!("ready ({:.1} MB)", meta.len() as f64 / (1024.0 * 1024.0)),
                    Err(_) => {
                        missing += 1;
                        "not installed".to_string()
                    }
                };
                println!("    - {:30} {}", file.local, status);
            }

            if missing > 0 {
                println!("\nRun `glimpse models download` to download missing files.");
            }
        }

        ModelsCommand::Path => {
            println!("{}", model_dir.display());
        }
    }

    Ok(())
}
