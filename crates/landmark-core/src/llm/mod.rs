//! Generative enrichment for recognized landmarks.
//!
//! Provides a provider abstraction over several text-generation backends
//! (Gemini, OpenAI, Ollama) and the enricher that turns a label into a
//! `LandmarkRecord`, falling back to fixed content on any failure.

pub(crate) mod enricher;
pub(crate) mod gemini;
pub(crate) mod ollama;
pub(crate) mod openai;
pub(crate) mod provider;
pub(crate) mod retry;

pub use enricher::{parse_record, EnrichOptions, LandmarkEnricher};
pub use gemini::to_gemini_schema;
pub use retry::RetryPolicy;
pub use provider::{
    landmark_schema, resolve_env_var, LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse,
};
