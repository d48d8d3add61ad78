use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

pub const MODEL_FILE: &str = "kokoro-v1.0.onnx";
pub const VOICES_FILE: &str = "voices-v1.0.bin";

const RELEASE_BASE_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0";

const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Location of the Kokoro model and voice bank.
#[derive(Debug, Clone)]
pub struct KokoroAssets {
    dir: PathBuf,
    base_url: String,
}

impl KokoroAssets {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            base_url: RELEASE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn voices_path(&self) -> PathBuf {
        self.dir.join(VOICES_FILE)
    }

    pub fn is_present(&self) -> bool {
        self.model_path().is_file() && self.voices_path().is_file()
    }

    /// Download whichever asset is missing. Existing files are left alone.
    pub async fn ensure(&self) -> Result<(), AppError> {
        if self.is_present() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Engine(format!("Failed to build HTTP client: {}", e)))?;

        for file_name in [MODEL_FILE, VOICES_FILE] {
            let destination = self.dir.join(file_name);
            if destination.is_file() {
                continue;
            }
            let url = format!("{}/{}", self.base_url, file_name);
            download(&client, &url, &destination).await?;
        }
        Ok(())
    }
}

async fn download(client: &reqwest::Client, url: &str, destination: &Path) -> Result<(), AppError> {
    tracing::info!("Downloading {} to {}...", url, destination.display());

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Engine(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AppError::Engine(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Engine(format!("Failed to download {}: {}", url, e)))?;

    store(&bytes, destination).await?;
    tracing::info!("Downloaded {} bytes to {}", bytes.len(), destination.display());
    Ok(())
}

/// Write next to the target, then rename, so a partial file never looks
/// like a valid asset. The `.part` file is gone whichever step fails.
async fn store(bytes: &[u8], destination: &Path) -> Result<(), AppError> {
    let partial = destination.with_extension("part");
    let written = async {
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, destination).await
    };
    if let Err(e) = written.await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixed_file_names() {
        let assets = KokoroAssets::new(PathBuf::from("/srv/kokoro"));
        assert_eq!(assets.model_path(), PathBuf::from("/srv/kokoro/kokoro-v1.0.onnx"));
        assert_eq!(assets.voices_path(), PathBuf::from("/srv/kokoro/voices-v1.0.bin"));
    }

    #[tokio::test]
    async fn test_present_assets_skip_download() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), b"model").unwrap();
        std::fs::write(dir.path().join(VOICES_FILE), b"voices").unwrap();

        // An unroutable base URL proves nothing is fetched
        let assets = KokoroAssets::new(dir.path().to_path_buf())
            .with_base_url("http://127.0.0.1:9/unreachable");
        assert!(assets.is_present());
        assets.ensure().await.unwrap();
    }

    #[tokio::test]
    async fn test_download_failure_is_engine_error() {
        let dir = TempDir::new().unwrap();
        let assets = KokoroAssets::new(dir.path().to_path_buf())
            .with_base_url("http://127.0.0.1:9/unreachable");

        assert!(matches!(assets.ensure().await, Err(AppError::Engine(_))));
        assert!(!dir.path().join(MODEL_FILE).exists());
    }

    #[tokio::test]
    async fn test_store_replaces_via_partial_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join(VOICES_FILE);

        store(b"voices", &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"voices");
        assert!(!destination.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_failed_store_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory in the way makes the final step fail
        let destination = dir.path().join(MODEL_FILE);
        std::fs::create_dir(&destination).unwrap();
        std::fs::write(destination.join("keep"), b"x").unwrap();

        assert!(matches!(store(b"model", &destination).await, Err(AppError::Io(_))));
        assert!(!destination.with_extension("part").exists());
        assert!(destination.join("keep").exists());

        // Unwritable partial path
        let missing = dir.path().join("no-such-dir").join(MODEL_FILE);
        assert!(store(b"model", &missing).await.is_err());
        assert!(!missing.with_extension("part").exists());
    }
}
