//! On-device landmark classification.
//!
//! The `Classifier` trait is the seam the pipeline depends on. `OnnxClassifier`
//! is the production implementation: it fetches the model artifact on first
//! use (at most once), then runs inference through ONNX Runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use landmark_core::classifier::{Classifier, OnnxClassifier, get_top_prediction};
//!
//! let classifier = OnnxClassifier::new(config.classifier.clone(), config.limits.clone());
//! classifier.load_model().await?;
//! let predictions = classifier.predict(decoded).await?;
//! let top = get_top_prediction(&predictions);
//! ```

pub(crate) mod artifact;
pub(crate) mod preprocess;
pub(crate) mod session;

pub use artifact::{ArtifactLocation, ModelMetadata};
pub use preprocess::InputLayout;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::{ClassifierConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::DecodedImage;
use crate::types::Prediction;

use self::artifact::ModelArtifact;
use self::preprocess::preprocess;
use self::session::ClassifierSession;

/// Image classifier with an explicitly owned, lazily loaded model.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Load the model if it isn't loaded yet. Safe to call repeatedly.
    async fn load_model(&self) -> PipelineResult<()>;

    /// Whether the model is already loaded.
    fn is_loaded(&self) -> bool;

    /// Classify an image, loading the model first if needed.
    ///
    /// Returns predictions sorted by descending confidence.
    async fn predict(&self, image: DecodedImage) -> PipelineResult<Vec<Prediction>>;
}

/// The highest-ranked prediction, if any.
pub fn get_top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions.first()
}

/// Sort predictions by descending confidence.
pub fn sort_predictions(predictions: &mut [Prediction]) {
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// A loaded model ready for inference.
struct LoadedModel {
    session: ClassifierSession,
    labels: Vec<String>,
    image_size: u32,
}

/// ONNX Runtime classifier backed by a fetched model artifact.
pub struct OnnxClassifier {
    config: ClassifierConfig,
    limits: LimitsConfig,
    layout: InputLayout,
    client: reqwest::Client,
    model: OnceCell<Arc<LoadedModel>>,
}

impl OnnxClassifier {
    pub fn new(config: ClassifierConfig, limits: LimitsConfig) -> Self {
        let layout = config.input_layout.parse().unwrap_or_default();
        Self {
            config,
            limits,
            layout,
            client: reqwest::Client::new(),
            model: OnceCell::new(),
        }
    }

    /// Get the loaded model, fetching it on first call.
    ///
    /// A failed load leaves the cell empty so the next call retries.
    async fn model(&self) -> PipelineResult<Arc<LoadedModel>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let artifact = ModelArtifact::fetch(&self.client, &self.config, &self.limits)
                    .await
                    .inspect_err(|e| tracing::error!("Model load failed: {}", e.detail()))?;
                let loaded = build_model(artifact).await;
                if let Err(e) = &loaded {
                    tracing::error!("Model load failed: {}", e.detail());
                }
                loaded.map(Arc::new)
            })
            .await?;
        Ok(model.clone())
    }

    fn finish(&self, scores: Vec<f32>, labels: &[String]) -> PipelineResult<Vec<Prediction>> {
        if scores.len() != labels.len() {
            return Err(PipelineError::Prediction {
                detail: format!(
                    "Model produced {} scores for {} labels",
                    scores.len(),
                    labels.len()
                ),
            });
        }

        let mut scores = scores;
        if self.config.apply_softmax {
            crate::math::softmax_in_place(&mut scores);
        }

        let mut predictions: Vec<Prediction> = labels
            .iter()
            .zip(scores)
            .map(|(label, score)| Prediction::new(label.clone(), crate::math::clamp_unit(score)))
            .collect();
        sort_predictions(&mut predictions);
        Ok(predictions)
    }
}

async fn build_model(artifact: ModelArtifact) -> PipelineResult<LoadedModel> {
    let ModelArtifact {
        model_bytes,
        metadata,
    } = artifact;

    let session = tokio::task::spawn_blocking(move || ClassifierSession::from_memory(&model_bytes))
        .await
        .map_err(|e| PipelineError::ModelLoad {
            detail: format!("Task join error: {e}"),
        })??;
    check_label_count(session.output_width(), metadata.labels.len())?;

    tracing::info!(
        "Landmark classifier ready ({} labels, {}px input)",
        metadata.labels.len(),
        metadata.image_size
    );

    Ok(LoadedModel {
        session,
        labels: metadata.labels,
        image_size: metadata.image_size,
    })
}

/// The label list must cover the model's output exactly. A dynamic output
/// width is checked per call in `finish` instead.
fn check_label_count(output_width: Option<usize>, labels: usize) -> PipelineResult<()> {
    match output_width {
        Some(width) if width != labels => Err(PipelineError::ModelLoad {
            detail: format!("Model outputs {width} classes but metadata lists {labels} labels"),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    async fn load_model(&self) -> PipelineResult<()> {
        self.model().await.map(|_| ())
    }

    fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn predict(&self, image: DecodedImage) -> PipelineResult<Vec<Prediction>> {
        let model = self.model().await?;
        let layout = self.layout;
        let timeout_ms = self.limits.inference_timeout_ms;

        let worker = model.clone();
        let inference = tokio::task::spawn_blocking(move || {
            let tensor = preprocess(&image.image, worker.image_size, layout);
            worker.session.run(&tensor)
        });

        let scores = match tokio::time::timeout(Duration::from_millis(timeout_ms), inference).await
        {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(PipelineError::Prediction {
                    detail: format!("Task join error: {e}"),
                })
            }
            Err(_) => {
                return Err(PipelineError::Prediction {
                    detail: format!("Inference timed out after {timeout_ms}ms"),
                })
            }
        };

        self.finish(scores, &model.labels)
    }
}
