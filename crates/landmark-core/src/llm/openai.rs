//! OpenAI LLM provider using the Chat Completions API.
//!
//! Structured output uses `response_format: json_schema` in strict mode.

use super::provider::{send_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// OpenAI provider using Chat Completions API.
pub struct OpenAiProvider {
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

/// Name of the strict JSON schema sent with every request.
const SCHEMA_NAME: &str = "landmark";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, request: &'a LlmRequest) -> Self {
        Self {
            model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: StrictSchema {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: &request.schema,
                },
            },
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: StrictSchema<'a>,
}

#[derive(Serialize)]
struct StrictSchema<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Content of the first choice, or why there is none.
    fn into_content(self) -> Result<(String, String, Option<u32>), PipelineError> {
        let tokens = self.usage.map(|u| u.total_tokens);
        let message = self.choices.into_iter().next().map(|c| c.message);
        let content = match message {
            Some(ChoiceMessage {
                content: Some(text),
                ..
            }) if !text.trim().is_empty() => text,
            Some(ChoiceMessage {
                refusal: Some(reason),
                ..
            }) => {
                return Err(PipelineError::Llm {
                    message: format!("OpenAI refused the request: {reason}"),
                    status_code: None,
                })
            }
            _ => {
                return Err(PipelineError::Llm {
                    message: "OpenAI returned no content".to_string(),
                    status_code: None,
                })
            }
        };
        Ok((content, self.model, tokens))
    }
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        let start = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::new(&self.model, request))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| send_error("OpenAI", self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm {
                message: format!("OpenAI HTTP {status}: {detail}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| PipelineError::Llm {
            message: format!("Failed to parse OpenAI response: {e}"),
            status_code: None,
        })?;
        let (text, model, tokens_used) = parsed.into_content()?;

        Ok(LlmResponse {
            text: text.trim().to_string(),
            model,
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
