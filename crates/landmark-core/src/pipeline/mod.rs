//! The scan pipeline.
//!
//! - **store**: Revocable registry for captured image bytes
//! - **validate**: Size and magic-byte checks before decoding
//! - **decode**: Decode registered images off the async runtime
//! - **gate**: Confidence threshold between classification and enrichment
//! - **state**: Pure transition table
//! - **machine**: Orchestrator that runs a scan and publishes snapshots

pub mod decode;
pub mod gate;
pub mod machine;
pub mod state;
pub mod store;
pub mod validate;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use gate::CONFIDENCE_THRESHOLD;
pub use machine::{LandmarkPipeline, PipelineSnapshot};
pub use state::{transition, EventKind};
pub use store::{ImageRef, ImageStore};
pub use validate::Validator;
