//! Landmark Core - point a camera at a landmark, get a kid-friendly guide.
//!
//! The library implements the scan pipeline and leaves presentation to the
//! caller:
//!
//! ```text
//! Capture → Decode → Classify (ONNX) → Confidence Gate → Enrich (LLM) → LandmarkRecord
//! ```
//!
//! A single state machine (`LandmarkPipeline`) supervises every hop and
//! publishes a `PipelineSnapshot` after each transition.
//!
//! # Usage
//!
//! ```rust,ignore
//! use landmark_core::{CaptureProvider, Config, LandmarkPipeline};
//!
//! #[tokio::main]
//! async fn main() -> landmark_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = LandmarkPipeline::from_config(&config);
//!     pipeline.preload();
//!
//!     let capture = CaptureProvider::from_config(&config.camera);
//!     if let Some(handle) = capture.pick_file(Some("./tower.jpg".as_ref())).await? {
//!         let snapshot = pipeline.run(handle).await;
//!         println!("{:?}", snapshot.record);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub(crate) mod math;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use capture::{CaptureHandle, CaptureProvider};
pub use classifier::{get_top_prediction, Classifier, OnnxClassifier};
pub use config::Config;
pub use error::{ConfigError, LandmarkError, PipelineError, PipelineResult, Result};
pub use llm::LandmarkEnricher;
pub use pipeline::{LandmarkPipeline, PipelineSnapshot};
pub use types::{AppState, LandmarkRecord, Prediction};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_pipeline_starts_home() {
        let pipeline = LandmarkPipeline::from_config(&Config::default());
        assert_eq!(pipeline.state(), AppState::Home);
    }
}
