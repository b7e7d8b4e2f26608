//! LLM provider trait and request/response types.
//!
//! Defines the interface that all text-generation providers implement, plus
//! the factory that creates the configured provider.

use crate::config::EnrichmentConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// A request for structured JSON content.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Text prompt for the model
    pub prompt: String,
    /// JSON schema the response must follow (OpenAPI-style lowercase types)
    pub schema: Value,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl LlmRequest {
    /// Build the tour-guide request for a recognized landmark label.
    pub fn describe_landmark(label: &str) -> Self {
        let prompt = format!(
            "You are an enthusiastic, fun, and educational tour guide for a 10-year-old kid.\n\
             The user is looking at a landmark identified as \"{label}\".\n\
             \n\
             Please provide details about this landmark in a way that is easy to read, \
             engaging, and perfect for a 4th grader.\n\
             Avoid complex jargon. Use emojis occasionally to make it fun.\n\
             \n\
             Return a JSON object with the following fields:\n\
             - name: The proper name of the landmark (fix capitalization or formatting if \
             needed from the raw input \"{label}\").\n\
             - history: A short, interesting story about how/when it was built. Max 3 sentences.\n\
             - funFacts: An array of 3 super cool, surprising facts.\n\
             - architecture: Describe what it looks like and its style in simple terms \
             (e.g., \"It's shaped like a giant triangle!\").\n\
             - visitInfo: Practical tips for visiting (e.g., \"Best time to go\", \
             \"Look for the secret door\", etc.)."
        );

        Self {
            prompt,
            schema: landmark_schema(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Response schema for a `LandmarkRecord`.
pub fn landmark_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "history": { "type": "string" },
            "funFacts": {
                "type": "array",
                "items": { "type": "string" }
            },
            "architecture": { "type": "string" },
            "visitInfo": { "type": "string" }
        },
        "required": ["name", "history", "funFacts", "architecture", "visitInfo"],
        "additionalProperties": false
    })
}

/// The response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text (expected to be JSON)
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "gemini", "ollama").
    fn name(&self) -> &str;

    /// Generate content for the given request.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError>;
}

/// Map a failed `send()`.
///
/// Timeouts and connections that were refused, reset, or never resolved stay
/// retryable. Anything else (bad URL, builder errors) is final.
pub(crate) fn send_error(service: &str, timeout: Duration, e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::Timeout {
            stage: format!("{service} request"),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if e.is_connect() || e.is_request() {
        PipelineError::Unreachable {
            service: service.to_string(),
            detail: error_chain(&e),
        }
    } else {
        PipelineError::Llm {
            message: format!("{service} request failed: {}", error_chain(&e)),
            status_code: None,
        }
    }
}

/// `Display` of an error plus its sources, which reqwest leaves out.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the configured provider.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the provider named by `config.provider`.
    ///
    /// Fails when the provider is unknown or its credential is missing.
    pub fn create(config: &EnrichmentConfig) -> Result<Box<dyn LlmProvider>, PipelineError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        match config.provider.as_str() {
            "gemini" => {
                let cfg = config.gemini.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Llm {
                    message: "Gemini API key not set. Set GEMINI_API_KEY env var.".to_string(),
                    status_code: None,
                })?;
                Ok(Box::new(super::gemini::GeminiProvider::new(
                    &cfg.endpoint,
                    &api_key,
                    &cfg.model,
                    timeout,
                )))
            }
            "openai" => {
                let cfg = config.openai.clone().unwrap_or_default();
                let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| PipelineError::Llm {
                    message: "OpenAI API key not set. Set OPENAI_API_KEY env var.".to_string(),
                    status_code: None,
                })?;
                Ok(Box::new(super::openai::OpenAiProvider::new(
                    &cfg.endpoint,
                    &api_key,
                    &cfg.model,
                    timeout,
                )))
            }
            "ollama" => {
                let cfg = config.ollama.clone().unwrap_or_default();
                Ok(Box::new(super::ollama::OllamaProvider::new(
                    &cfg.endpoint,
                    &cfg.model,
                    timeout,
                )))
            }
            other => Err(PipelineError::Llm {
                message: format!("Unknown LLM provider: {other}"),
                status_code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    #[test]
    fn test_describe_landmark_mentions_label_twice() {
        let request = LlmRequest::describe_landmark("eiffel_tower");
        assert_eq!(request.prompt.matches("\"eiffel_tower\"").count(), 2);
        assert!(request.prompt.contains("10-year-old"));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = landmark_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            required,
            vec!["name", "history", "funFacts", "architecture", "visitInfo"]
        );
        assert_eq!(schema["properties"]["funFacts"]["type"], "array");
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let config = EnrichmentConfig {
            provider: "carrier-pigeon".to_string(),
            ..EnrichmentConfig::default()
        };
        let err = LlmProviderFactory::create(&config).err().unwrap();
        assert!(err.detail().contains("carrier-pigeon"));
    }

    #[test]
    fn test_factory_missing_gemini_key() {
        let config = EnrichmentConfig {
            gemini: Some(GeminiConfig {
                api_key: "${DEFINITELY_NOT_SET_XYZ_123}".to_string(),
                ..GeminiConfig::default()
            }),
            ..EnrichmentConfig::default()
        };
        let err = LlmProviderFactory::create(&config).err().unwrap();
        assert!(err.detail().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_factory_builds_ollama_without_key() {
        let config = EnrichmentConfig {
            provider: "ollama".to_string(),
            ..EnrichmentConfig::default()
        };
        let provider = LlmProviderFactory::create(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_factory_builds_gemini_with_literal_key() {
        let config = EnrichmentConfig {
            gemini: Some(GeminiConfig {
                api_key: "test-key".to_string(),
                ..GeminiConfig::default()
            }),
            ..EnrichmentConfig::default()
        };
        let provider = LlmProviderFactory::create(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Nothing listens on the discard port.
        let err = reqwest::Client::new()
            .post("http://127.0.0.1:9/generate")
            .send()
            .await
            .unwrap_err();
        let mapped = send_error("test", Duration::from_secs(1), err);
        assert!(matches!(mapped, PipelineError::Unreachable { .. }), "{mapped:?}");
        assert!(crate::llm::retry::is_transient(&mapped));
        assert!(mapped.detail().starts_with("test unreachable"));
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = PipelineError::ModelLoad {
            detail: "x".to_string(),
        };
        assert_eq!(error_chain(&inner), "refused");
        assert!(error_chain(&outer).starts_with("Failed to load"));
    }
}
