//! Scoped temporary storage for uploads.
//!
//! The captioning model loads images by path, so each upload is written to a
//! uniquely named file. The returned [`TempImage`] guard removes that file
//! when dropped, on every exit path.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension used when the declared filename carries none.
const DEFAULT_EXTENSION: &str = "jpg";

/// Writes uploads into a directory under unique names.
#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory uploads are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to `<dir>/<uuid>.<ext>` and return a guard owning the file.
    ///
    /// The file is created and filled on the blocking pool. The guard exists
    /// from the moment the file does, so a failed write removes it, and so
    /// does dropping this future mid-write (the task still runs to completion
    /// and its result, guard included, is dropped).
    pub async fn persist(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> std::io::Result<TempImage> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(unique_name(original_name));
        let size = bytes.len();
        let image = tokio::task::spawn_blocking(move || write_new(path, &bytes))
            .await
            .map_err(std::io::Error::other)??;
        tracing::debug!("Stored upload {:?} at {:?} ({} bytes)", original_name, image.path, size);

        Ok(image)
    }
}

/// Create `path` (which must not exist yet) and write `bytes` into it.
fn write_new(path: PathBuf, bytes: &[u8]) -> std::io::Result<TempImage> {
    let (image, mut file) = create_guarded(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(image)
}

/// Create a new file and its guard together. `create_new` keeps an existing
/// file at `path` from ever being owned (and later deleted) by a guard.
fn create_guarded(path: PathBuf) -> std::io::Result<(TempImage, std::fs::File)> {
    let file = std::fs::File::create_new(&path)?;
    Ok((TempImage { path }, file))
}

/// Build `<uuid-v4>.<ext>` from the original filename's extension.
fn unique_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}.{}", uuid::Uuid::new_v4(), extension)
}

/// A temporary image on disk, deleted when the guard goes out of scope.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
}

impl TempImage {
    /// Path of the stored image.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// A single unlink; cheap enough to run inline even on a runtime worker.
impl Drop for TempImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temp file {:?}", self.path),
            Err(e) => tracing::warn!("Failed to remove temp file {:?}: {e}", self.path),
        }
    }
}
