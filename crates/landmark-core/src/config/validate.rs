//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const PROVIDERS: &[&str] = &["gemini", "openai", "ollama"];
const LAYOUTS: &[&str] = &["nhwc", "nchw"];
const FACINGS: &[&str] = &["environment", "user"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.inference_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.inference_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.model_fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.model_fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.classifier.model_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "classifier.model_url must not be empty".into(),
            ));
        }
        if !LAYOUTS.contains(&self.classifier.input_layout.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "classifier.input_layout must be one of {LAYOUTS:?}"
            )));
        }
        if self.classifier.max_artifact_mb == 0 {
            return Err(ConfigError::ValidationError(
                "classifier.max_artifact_mb must be > 0".into(),
            ));
        }
        if !PROVIDERS.contains(&self.enrichment.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "enrichment.provider must be one of {PROVIDERS:?}"
            )));
        }
        if self.enrichment.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment.timeout_ms must be > 0".into(),
            ));
        }
        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "camera.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        let facings = std::iter::once(&self.camera.prefer_facing)
            .chain(self.camera.devices.iter().map(|d| &d.facing));
        for facing in facings {
            if !FACINGS.contains(&facing.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "camera facing must be one of {FACINGS:?}, got {facing:?}"
                )));
            }
        }
        Ok(())
    }
}
