//! Landmark enrichment: turns a recognized label into kid-friendly guide content.
//!
//! `LandmarkEnricher::enrich` never fails. Every provider, transport, or
//! parsing failure collapses into `LandmarkRecord::fallback`, so the pipeline
//! always reaches RESULT once a prediction is accepted.

use super::provider::{LlmProvider, LlmProviderFactory, LlmRequest};
use super::retry::RetryPolicy;
use crate::config::EnrichmentConfig;
use crate::error::PipelineError;
use crate::types::LandmarkRecord;
use std::sync::Arc;
use std::time::Duration;

/// Retry and timeout settings for one enrichment call.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum retries after the first attempt
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl EnrichOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_delay_ms)
    }
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for EnrichOptions {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Produces a `LandmarkRecord` for a label, falling back on any failure.
pub struct LandmarkEnricher {
    provider: Option<Arc<dyn LlmProvider>>,
    options: EnrichOptions,
}

impl LandmarkEnricher {
    pub fn new(provider: Box<dyn LlmProvider>, options: EnrichOptions) -> Self {
        Self {
            provider: Some(Arc::from(provider)),
            options,
        }
    }

    /// An enricher with no provider. Always returns fallback content.
    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            options: EnrichOptions::default(),
        }
    }

    /// Build from config. A provider that cannot be constructed (unknown
    /// name, missing credential) degrades to fallback-only.
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        match LlmProviderFactory::create(config) {
            Ok(provider) => {
                tracing::debug!("Enrichment provider: {}", provider.name());
                Self::new(provider, EnrichOptions::from(config))
            }
            Err(e) => {
                tracing::warn!(
                    "Enrichment disabled, using fallback content: {}",
                    e.detail()
                );
                Self {
                    provider: None,
                    options: EnrichOptions::from(config),
                }
            }
        }
    }

    /// Name of the active provider, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Fetch guide content for `label`. Never fails.
    pub async fn enrich(&self, label: &str) -> LandmarkRecord {
        let Some(provider) = &self.provider else {
            return LandmarkRecord::fallback(label);
        };

        match self.try_enrich(provider.as_ref(), label).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    "Enrichment failed for {label:?}, using fallback: {}",
                    e.detail()
                );
                LandmarkRecord::fallback(label)
            }
        }
    }

    async fn try_enrich(
        &self,
        provider: &dyn LlmProvider,
        label: &str,
    ) -> Result<LandmarkRecord, PipelineError> {
        let request = LlmRequest::describe_landmark(label);
        let timeout = Duration::from_millis(self.options.timeout_ms);
        let policy = self.options.retry_policy();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(timeout, provider.generate(&request)).await {
                Ok(Ok(response)) => {
                    tracing::debug!(
                        "Enrichment from {} in {}ms (tokens: {:?})",
                        response.model,
                        response.latency_ms,
                        response.tokens_used
                    );
                    // A malformed body is final.
                    return parse_record(&response.text);
                }
                Ok(Err(e)) => e,
                Err(_) => PipelineError::Timeout {
                    stage: "enrichment".to_string(),
                    timeout_ms: self.options.timeout_ms,
                },
            };

            if !policy.should_retry(&error, attempt) {
                return Err(error);
            }

            let delay = policy.delay(attempt);
            tracing::debug!(
                "Attempt {attempt}/{} for {label:?} failed ({}), retrying in {delay:?}",
                policy.attempts(),
                error.detail()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Parse and check a generated record.
///
/// Tolerates a surrounding markdown code fence. Every field must be present
/// and non-blank.
pub fn parse_record(text: &str) -> Result<LandmarkRecord, PipelineError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(PipelineError::Llm {
            message: "No data returned from the provider".to_string(),
            status_code: None,
        });
    }

    let record: LandmarkRecord = serde_json::from_str(body).map_err(|e| PipelineError::Llm {
        message: format!("Malformed landmark JSON: {e}"),
        status_code: None,
    })?;

    if let Some(field) = record.first_blank_field() {
        return Err(PipelineError::Llm {
            message: format!("Landmark JSON has an empty {field}"),
            status_code: None,
        });
    }
    Ok(record)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") up to the first newline
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
