//! Classifier model artifact: network weights plus label metadata.
//!
//! Both resources live under one base location, either an http(s) URL or a
//! local directory. They are fetched once per classifier and kept in memory.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;

use crate::config::{ClassifierConfig, LimitsConfig};
use crate::error::PipelineError;

/// Label metadata shipped next to the model.
///
/// Matches the Teachable Machine `metadata.json` layout; unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    /// Class names, in model output order
    pub labels: Vec<String>,

    /// Square input size the model was trained on
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Optional human-readable model name
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_image_size() -> u32 {
    224
}

/// Where the artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Remote(String),
    Local(PathBuf),
}

impl ArtifactLocation {
    pub fn parse(base: &str) -> Self {
        if base.starts_with("http://") || base.starts_with("https://") {
            Self::Remote(base.trim_end_matches('/').to_string())
        } else {
            let path = base.strip_prefix("file://").unwrap_or(base);
            Self::Local(PathBuf::from(shellexpand::tilde(path).into_owned()))
        }
    }

    fn describe(&self, file: &str) -> String {
        match self {
            Self::Remote(base) => format!("{base}/{file}"),
            Self::Local(dir) => dir.join(file).display().to_string(),
        }
    }
}

/// The fetched artifact, held in memory for the classifier's lifetime.
pub struct ModelArtifact {
    pub model_bytes: Vec<u8>,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Fetch and check both resources. Every failure is a `ModelLoad` error.
    pub async fn fetch(
        client: &reqwest::Client,
        config: &ClassifierConfig,
        limits: &LimitsConfig,
    ) -> Result<Self, PipelineError> {
        let location = ArtifactLocation::parse(&config.model_url);
        let fetcher = Fetcher {
            client,
            location: &location,
            max_bytes: config.max_artifact_mb * 1024 * 1024,
            timeout: Duration::from_millis(limits.model_fetch_timeout_ms),
        };

        let metadata_bytes = fetcher.fetch(&config.metadata_file).await?;
        let metadata: ModelMetadata =
            serde_json::from_slice(&metadata_bytes).map_err(|e| PipelineError::ModelLoad {
                detail: format!(
                    "Invalid label metadata at {}: {e}",
                    location.describe(&config.metadata_file)
                ),
            })?;
        if metadata.labels.is_empty() {
            return Err(PipelineError::ModelLoad {
                detail: "Label metadata lists no labels".to_string(),
            });
        }
        if metadata.image_size == 0 {
            return Err(PipelineError::ModelLoad {
                detail: "Label metadata has imageSize 0".to_string(),
            });
        }

        let model_bytes = fetcher.fetch(&config.model_file).await?;
        if let Some(expected) = &config.model_blake3 {
            verify_blake3(&model_bytes, expected)?;
        }

        tracing::info!(
            "Fetched classifier artifact from {} ({:.1} MB, {} labels)",
            location.describe(&config.model_file),
            model_bytes.len() as f64 / (1024.0 * 1024.0),
            metadata.labels.len()
        );

        Ok(Self {
            model_bytes,
            metadata,
        })
    }
}

struct Fetcher<'a> {
    client: &'a reqwest::Client,
    location: &'a ArtifactLocation,
    max_bytes: u64,
    timeout: Duration,
}

impl Fetcher<'_> {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, PipelineError> {
        match self.location {
            ArtifactLocation::Remote(base) => self.fetch_remote(&format!("{base}/{file}")).await,
            ArtifactLocation::Local(dir) => {
                let path = dir.join(file);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| PipelineError::ModelLoad {
                        detail: format!("Cannot read {}: {e}", path.display()),
                    })?;
                self.check_size(bytes.len() as u64, &path.display().to_string())?;
                Ok(bytes)
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::ModelLoad {
                detail: format!("Download failed for {url}: {e}"),
            })?;

        if let Some(size) = response.content_length() {
            self.check_size(size, url)?;
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::ModelLoad {
                detail: format!("Download interrupted for {url}: {e}"),
            })?;
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64, url)?;
        }
        Ok(bytes)
    }

    fn check_size(&self, size: u64, what: &str) -> Result<(), PipelineError> {
        if size > self.max_bytes {
            return Err(PipelineError::ModelLoad {
                detail: format!("{what} exceeds {} bytes", self.max_bytes),
            });
        }
        Ok(())
    }
}

fn verify_blake3(bytes: &[u8], expected: &str) -> Result<(), PipelineError> {
    let actual = blake3::hash(bytes).to_hex();
    if !actual.as_str().eq_ignore_ascii_case(expected.trim()) {
        return Err(PipelineError::ModelLoad {
            detail: format!("Checksum mismatch: expected {expected}, got {actual}"),
        });
    }
    Ok(())
}
