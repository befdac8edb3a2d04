//! Fetching BLIP model files from the Hugging Face hub.

use std::path::{Path, PathBuf};

use crate::config::CaptioningConfig;
use crate::error::CaptionError;

use super::{DECODER_MODEL_FILENAME, TOKENIZER_FILENAME, VISION_MODEL_FILENAME};

/// One model file: where it lives in the hub repository and on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    /// Path inside the hub repository
    pub remote: String,
    /// Filename inside the local model directory
    pub local: &'static str,
}

impl ModelFile {
    /// Download URL for this file in `repo`.
    pub fn url(&self, repo: &str) -> String {
        format!("https://huggingface.co/{}/resolve/main/{}", repo, self.remote)
    }
}

/// Every file the BLIP captioner needs.
pub fn model_files(config: &CaptioningConfig) -> Vec<ModelFile> {
    vec![
        ModelFile {
            remote: config.vision_model_file.clone(),
            local: VISION_MODEL_FILENAME,
        },
        ModelFile {
            remote: config.decoder_model_file.clone(),
            local: DECODER_MODEL_FILENAME,
        },
        ModelFile {
            remote: config.tokenizer_file.clone(),
            local: TOKENIZER_FILENAME,
        },
    ]
}

/// Files not yet present in `model_dir`.
pub fn missing_files(config: &CaptioningConfig, model_dir: &Path) -> Vec<ModelFile> {
    model_files(config)
        .into_iter()
        .filter(|f| !model_dir.join(f.local).exists())
        .collect()
}

/// Download every missing model file into `model_dir`. Skips files already
/// on disk.
pub async fn download_model(
    client: &reqwest::Client,
    config: &CaptioningConfig,
    model_dir: &Path,
) -> Result<(), CaptionError> {
    let missing = missing_files(config, model_dir);
    if missing.is_empty() {
        tracing::info!("{} already present at {:?}", config.model, model_dir);
        return Ok(());
    }

    tokio::fs::create_dir_all(model_dir)
        .await
        .map_err(|e| CaptionError::Download {
            url: model_dir.display().to_string(),
            message: format!("Cannot create model directory: {e}"),
        })?;

    for file in missing {
        let url = file.url(&config.repo);
        let dest = model_dir.join(file.local);

        tracing::info!("Downloading {}...", file.local);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        download_file(client, &url, &dest).await?;
    }

    tracing::info!("{} download complete", config.model);
    Ok(())
}

/// Stream a file to disk. Data lands in a `.part` sibling first and is only
/// renamed into place once complete.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), CaptionError> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let fail = |message: String| CaptionError::Download {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| fail(e.to_string()))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| fail(format!("Cannot create {}: {e}", partial.display())))?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fail(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| fail(format!("Write failed: {e}")))?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| fail(format!("Flush failed: {e}")))?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| fail(format!("Cannot move download into place: {e}")))?;

    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
