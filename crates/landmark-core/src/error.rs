//! Error types for the Landmark Guide pipeline.
//!
//! Errors are organized by stage. Pipeline errors that can end a scan carry a
//! child-friendly `Display` message, which is shown verbatim in the error
//! screen; the technical detail lives in a separate field that is logged but
//! never displayed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Landmark Guide operations.
#[derive(Error, Debug)]
pub enum LandmarkError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Camera device denied or unavailable
    #[error("Could not access camera. Please check permissions.")]
    CameraAccess { detail: String },

    /// Image bytes could not be decoded
    #[error("That picture looks broken. Can you try a different one?")]
    Decode { file_name: String, detail: String },

    /// Image format is not one we can read
    #[error("I can't open {format} pictures. Try a JPEG or PNG photo!")]
    UnsupportedFormat { file_name: String, format: String },

    /// File exceeds size limit
    #[error("That picture is too big ({size_mb}MB). Try one smaller than {max_mb}MB.")]
    FileTooLarge {
        file_name: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("That picture is too big ({width}x{height}). Try a smaller one.")]
    ImageTooLarge {
        file_name: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Picked file does not exist or cannot be read
    #[error("I couldn't find that picture: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Classifier model artifact could not be fetched or loaded
    #[error("Failed to load the landmark recognizer. Please check your internet connection.")]
    ModelLoad { detail: String },

    /// Inference failed
    #[error("Oops! Couldn't recognize that image.")]
    Prediction { detail: String },

    /// Top prediction missing or below the confidence threshold
    #[error("I couldn't quite see what that was. Can you try getting closer?")]
    LowConfidence {
        label: Option<String>,
        confidence: Option<f32>,
    },

    /// Operation timed out
    #[error("That took too long ({stage} after {timeout_ms}ms). Please try again!")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Enrichment service could not be reached (refused, reset, DNS).
    #[error("Couldn't reach the guide book. Please try again!")]
    Unreachable { service: String, detail: String },

    /// LLM call failed. Only ever seen inside the enrichment stage.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },
}

impl PipelineError {
    /// Technical detail for logging, separate from the user-facing message.
    pub fn detail(&self) -> String {
        match self {
            Self::CameraAccess { detail }
            | Self::ModelLoad { detail }
            | Self::Prediction { detail } => detail.clone(),
            Self::Decode { file_name, detail } => format!("{file_name}: {detail}"),
            Self::UnsupportedFormat { file_name, format } => {
                format!("{file_name}: unsupported format {format}")
            }
            Self::FileTooLarge {
                file_name,
                size_mb,
                max_mb,
            } => format!("{file_name}: {size_mb}MB > {max_mb}MB"),
            Self::ImageTooLarge {
                file_name,
                width,
                height,
                max_dim,
            } => format!("{file_name}: {width}x{height} > {max_dim}"),
            Self::FileNotFound(path) => format!("not found: {}", path.display()),
            Self::LowConfidence { label, confidence } => match (label, confidence) {
                (Some(label), Some(c)) => format!("top prediction {label} at {c:.4}"),
                _ => "no predictions".to_string(),
            },
            Self::Timeout { stage, timeout_ms } => format!("{stage} timed out after {timeout_ms}ms"),
            Self::Unreachable { service, detail } => format!("{service} unreachable: {detail}"),
            Self::Llm {
                message,
                status_code,
            } => match status_code {
                Some(code) => format!("HTTP {code}: {message}"),
                None => message.clone(),
            },
        }
    }
}

/// Convenience type alias for Landmark Guide results.
pub type Result<T> = std::result::Result<T, LandmarkError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
