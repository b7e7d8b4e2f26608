//! Ollama provider for enrichment on a local model server.
//!
//! Structured output passes the record schema as `format`. No credential.

use super::provider::{send_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Ollama provider for local inference.
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

/// Body of a non-streaming `/api/generate` call.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    /// Schema the reply must follow
    format: &'a Value,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: u32,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, request: &'a LlmRequest) -> Self {
        Self {
            model,
            prompt: &request.prompt,
            format: &request.schema,
            stream: false,
            options: SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl GenerateResponse {
    fn tokens_used(&self) -> Option<u32> {
        Some(self.prompt_eval_count? + self.eval_count?)
    }

    /// Ran out of `num_predict` before the JSON closed.
    fn was_truncated(&self) -> bool {
        self.done_reason.as_deref() == Some("length")
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let url = format!("{}/api/generate", self.endpoint);
        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest::new(&self.model, request))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error("Ollama", self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm {
                message: format!("Ollama HTTP {status}: {detail}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| PipelineError::Llm {
            message: format!("Failed to parse Ollama response: {e}"),
            status_code: None,
        })?;

        if parsed.was_truncated() {
            return Err(PipelineError::Llm {
                message: format!("Ollama hit the {}-token limit", request.max_tokens),
                status_code: None,
            });
        }
        let text = parsed.response.trim();
        if text.is_empty() {
            return Err(PipelineError::Llm {
                message: "Ollama returned an empty response".to_string(),
                status_code: None,
            });
        }

        Ok(LlmResponse {
            text: text.to_string(),
            tokens_used: parsed.tokens_used(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let provider =
            OllamaProvider::new("http://localhost:11434/", "llama3.2", Duration::from_secs(1));
        assert_eq!(provider.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_request_sends_schema_as_format() {
        let request = LlmRequest::describe_landmark("big_ben");
        let value = serde_json::to_value(GenerateRequest::new("llama3.2", &request)).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["format"]["type"], "object");
        assert_eq!(value["options"]["num_predict"], request.max_tokens);
    }

    #[test]
    fn test_token_counts() {
        let resp = parse(r#"{"response":"{}","done":true,"prompt_eval_count":20,"eval_count":30}"#);
        assert_eq!(resp.tokens_used(), Some(50));
        assert!(parse(r#"{"response":"{}","eval_count":30}"#).tokens_used().is_none());
    }

    #[test]
    fn test_truncation_detected() {
        assert!(parse(r#"{"response":"{\"name\":","done_reason":"length"}"#).was_truncated());
        assert!(!parse(r#"{"response":"{}","done_reason":"stop"}"#).was_truncated());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Nothing listens on the discard port.
        let provider = OllamaProvider::new("http://127.0.0.1:9", "llama3.2", Duration::from_secs(1));
        let err = provider
            .generate(&LlmRequest::describe_landmark("big_ben"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Unreachable { .. }), "{err:?}");
        assert!(crate::llm::retry::is_transient(&err));
    }
}
