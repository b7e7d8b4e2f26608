//! ONNX Runtime session for the landmark classifier.

use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::PipelineError;

/// Wraps an ONNX Runtime session for image classification.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct ClassifierSession {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    /// Declared class count of the first output; `None` when dynamic.
    output_width: Option<usize>,
}

impl ClassifierSession {
    /// Build a session from in-memory model bytes.
    pub fn from_memory(model_bytes: &[u8]) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::ModelLoad {
                detail: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_memory(model_bytes)
            .map_err(|e| PipelineError::ModelLoad {
                detail: format!("Failed to load ONNX model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| PipelineError::ModelLoad {
                detail: "Model declares no inputs".to_string(),
            })?;

        let output_width = session
            .outputs()
            .first()
            .and_then(|o| o.dtype().tensor_shape().and_then(|shape| shape.last().copied()))
            .and_then(|dim| usize::try_from(dim).ok())
            .filter(|&dim| dim > 0);

        tracing::debug!(
            "Loaded classifier (input: {:?}, outputs: {:?}, classes: {:?})",
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>(),
            output_width
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_width,
        })
    }

    pub fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    /// Run inference on one preprocessed image and return the raw class scores.
    pub fn run(&self, tensor: &Array4<f32>) -> Result<Vec<f32>, PipelineError> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value =
            Value::from_array((shape, flat_data)).map_err(|e| PipelineError::Prediction {
                detail: format!("Failed to create input tensor: {e}"),
            })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self.session.lock().map_err(|e| PipelineError::Prediction {
            detail: format!("Session lock poisoned: {e}"),
        })?;

        let outputs = session.run(inputs).map_err(|e| PipelineError::Prediction {
            detail: format!("ONNX inference failed: {e}"),
        })?;

        let scores = outputs
            .iter()
            .next()
            .ok_or_else(|| PipelineError::Prediction {
                detail: "Model produced no outputs".to_string(),
            })?;

        let (shape, data) =
            scores
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Prediction {
                    detail: format!("Failed to extract score tensor: {e}"),
                })?;

        // Scores are [1, num_classes] or flat [num_classes].
        match shape.len() {
            1 => Ok(data.to_vec()),
            2 => {
                let classes = shape[1] as usize;
                Ok(data[..classes].to_vec())
            }
            _ => Err(PipelineError::Prediction {
                detail: format!("Unexpected score shape: {:?}", shape),
            }),
        }
    }
}
