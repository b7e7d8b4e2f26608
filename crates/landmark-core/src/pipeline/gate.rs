//! Confidence gate between classification and enrichment.

use crate::error::{PipelineError, PipelineResult};
use crate::types::Prediction;

/// Minimum confidence for the top prediction to be accepted.
pub const CONFIDENCE_THRESHOLD: f32 = 0.60;

/// Accept the top prediction iff it exists and clears the threshold.
pub fn accept(top: Option<&Prediction>) -> PipelineResult<Prediction> {
    match top {
        Some(prediction) if prediction.confidence >= CONFIDENCE_THRESHOLD => {
            Ok(prediction.clone())
        }
        Some(prediction) => Err(PipelineError::LowConfidence {
            label: Some(prediction.label.clone()),
            confidence: Some(prediction.confidence),
        }),
        None => Err(PipelineError::LowConfidence {
            label: None,
            confidence: None,
        }),
    }
}
