// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-run download of the local embedding model.
//!
//! Files are fetched from HuggingFace into
//! `<data_dir>/models/<model_name>/` and reused on later runs.

use std::path::{Path, PathBuf};

use rosemary_config::model::EmbeddingConfig;
use rosemary_core::RosemaryError;
use tokio::sync::Mutex;
use tracing::info;

const HUB: &str = "https://huggingface.co";

/// Resolves and downloads model files for one sentence-transformers model.
pub struct ModelManager {
    data_dir: PathBuf,
    model_name: String,
    download: Mutex<()>,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf, model_name: impl Into<String>) -> Self {
        Self {
            data_dir,
            model_name: model_name.into(),
            download: Mutex::new(()),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(PathBuf::from(&config.data_dir), config.model_name.clone())
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(&self.model_name)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir().join("tokenizer.json")
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    /// Quantized ONNX export and tokenizer URLs.
    fn sources(&self) -> [(&'static str, String); 2] {
        let name = &self.model_name;
        [
            (
                "model.onnx",
                format!("{HUB}/onnx-community/{name}-ONNX/resolve/main/onnx/model_quantized.onnx"),
            ),
            (
                "tokenizer.json",
                format!("{HUB}/sentence-transformers/{name}/resolve/main/tokenizer.json"),
            ),
        ]
    }

    /// Returns the model path, downloading missing files first.
    ///
    /// Concurrent callers wait for a single download.
    pub async fn ensure_model(&self) -> Result<PathBuf, RosemaryError> {
        let _guard = self.download.lock().await;
        if self.is_model_available() {
            return Ok(self.model_path());
        }

        let model_dir = self.model_dir();
        info!(model = %self.model_name, dir = %model_dir.display(), "downloading embedding model");
        tokio::fs::create_dir_all(&model_dir).await.map_err(|e| {
            RosemaryError::Internal(format!("cannot create {}: {e}", model_dir.display()))
        })?;

        for (filename, url) in self.sources() {
            let dest = model_dir.join(filename);
            if dest.exists() {
                continue;
            }
            let size = download_file(&url, &dest).await?;
            info!(file = filename, bytes = size, "model file downloaded");
        }
        Ok(self.model_path())
    }
}

/// Downloads `url` to `dest` through a `.part` file so an interrupted
/// download never leaves a truncated model behind.
async fn download_file(url: &str, dest: &Path) -> Result<usize, RosemaryError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| RosemaryError::Internal(format!("download {url} failed: {e}")))?;
    if !response.status().is_success() {
        return Err(RosemaryError::Internal(format!(
            "download {url} failed with status {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RosemaryError::Internal(format!("download {url} failed: {e}")))?;

    let partial = dest.with_extension("part");
    let write = async {
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, dest).await
    };
    if let Err(e) = write.await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(RosemaryError::Internal(format!(
            "cannot write {}: {e}",
            dest.display()
        )));
    }
    Ok(bytes.len())
}
