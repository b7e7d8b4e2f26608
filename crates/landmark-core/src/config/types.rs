//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum picked/captured image size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Classifier inference timeout in milliseconds
    pub inference_timeout_ms: u64,

    /// Timeout for fetching each model artifact resource
    pub model_fetch_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 20,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            inference_timeout_ms: 30000,
            model_fetch_timeout_ms: 60000,
        }
    }
}

/// Classifier model artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base location of the artifact: an http(s) URL or a local directory
    pub model_url: String,

    /// Topology + weights file name under `model_url`
    pub model_file: String,

    /// Label metadata file name under `model_url`
    pub metadata_file: String,

    /// Expected BLAKE3 hex digest of the model file, if pinned
    pub model_blake3: Option<String>,

    /// Input tensor layout: "nhwc" (TF exports) or "nchw"
    pub input_layout: String,

    /// Apply softmax to raw outputs (for models that emit logits)
    pub apply_softmax: bool,

    /// Kick off a best-effort model load at startup
    pub preload: bool,

    /// Size cap for each downloaded artifact resource, in megabytes
    pub max_artifact_mb: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_url: "https://models.landmark-guide.dev/landmarks/v1/".to_string(),
            model_file: "model.onnx".to_string(),
            metadata_file: "metadata.json".to_string(),
            model_blake3: None,
            input_layout: "nhwc".to_string(),
            apply_softmax: false,
            preload: true,
            max_artifact_mb: 200,
        }
    }
}

/// Enrichment (generative text) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Provider name: "gemini", "openai" or "ollama"
    pub provider: String,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries for transient failures (429, 5xx, timeouts)
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,

    /// Gemini configuration
    pub gemini: Option<GeminiConfig>,

    /// OpenAI configuration
    pub openai: Option<OpenAiConfig>,

    /// Ollama (local) configuration
    pub ollama: Option<OllamaConfig>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            timeout_ms: 30000,
            retry_attempts: 2,
            retry_delay_ms: 1000,
            gemini: None,
            openai: None,
            ollama: None,
        }
    }
}

/// Gemini configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base endpoint
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: "${GEMINI_API_KEY}".to_string(),
            model: "gemini-3-flash-preview".to_string(),
        }
    }
}

/// OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Chat Completions endpoint
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

/// Camera settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// JPEG quality for snapped photos (1-100)
    pub jpeg_quality: u8,

    /// Preferred sensor: "environment" (rear) or "user" (front)
    pub prefer_facing: String,

    /// Snapshot-capable cameras
    pub devices: Vec<CameraDeviceConfig>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            prefer_facing: "environment".to_string(),
            devices: vec![],
        }
    }
}

/// A camera reachable through a still-image snapshot URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDeviceConfig {
    /// Display name, also used to pick the device from the CLI
    pub name: String,

    /// URL returning one JPEG/PNG frame per GET
    pub url: String,

    /// "environment" or "user"
    #[serde(default = "default_facing")]
    pub facing: String,
}

fn default_facing() -> String {
    "environment".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
