//! Pipeline orchestrator: drives one scan from capture to guide content.
//!
//! All state lives in a `watch` channel. Every change goes through
//! `send_if_modified`, which checks the transition table, applies side effects
//! and publishes the new snapshot in one synchronous step. Results carry the
//! run id they were started under and are dropped if a newer run has begun.

use std::sync::Arc;

use tokio::sync::watch;

use super::decode::ImageDecoder;
use super::gate;
use super::state::{transition, EventKind};
use super::store::{ImageRef, ImageStore};
use crate::capture::CaptureHandle;
use crate::classifier::{get_top_prediction, Classifier, OnnxClassifier};
use crate::config::{Config, LimitsConfig};
use crate::error::PipelineResult;
use crate::llm::LandmarkEnricher;
use crate::types::{AppState, LandmarkRecord, Prediction};

/// What subscribers see after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    /// Id of the current (or last) run; 0 before the first run
    pub run_id: u64,
    pub state: AppState,
    /// The captured image, published as soon as the run starts
    pub image: Option<ImageRef>,
    /// The accepted prediction
    pub prediction: Option<Prediction>,
    /// Guide content, present in RESULT
    pub record: Option<LandmarkRecord>,
    /// User-facing error message, present in ERROR
    pub error: Option<String>,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            run_id: 0,
            state: AppState::Home,
            image: None,
            prediction: None,
            record: None,
            error: None,
        }
    }
}

impl PipelineSnapshot {
    /// Loading message for the busy states.
    pub fn loading_message(&self) -> Option<&'static str> {
        self.state.loading_message()
    }
}

/// An event with its payload. Capture is handled by `begin_run`.
#[derive(Debug)]
enum Event {
    Accepted(Prediction),
    Failed(String),
    Enriched(LandmarkRecord),
    Reset,
    TryAgain,
}

impl Event {
    fn kind(&self) -> EventKind {
        match self {
            Event::Accepted(_) => EventKind::Accepted,
            Event::Failed(_) => EventKind::Failed,
            Event::Enriched(_) => EventKind::Enriched,
            Event::Reset => EventKind::Reset,
            Event::TryAgain => EventKind::TryAgain,
        }
    }
}

/// The scan pipeline state machine.
pub struct LandmarkPipeline {
    classifier: Arc<dyn Classifier>,
    enricher: LandmarkEnricher,
    decoder: ImageDecoder,
    images: ImageStore,
    tx: watch::Sender<PipelineSnapshot>,
}

impl LandmarkPipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        enricher: LandmarkEnricher,
        limits: LimitsConfig,
    ) -> Self {
        let (tx, _rx) = watch::channel(PipelineSnapshot::default());
        Self {
            classifier,
            enricher,
            decoder: ImageDecoder::new(limits),
            images: ImageStore::new(),
            tx,
        }
    }

    /// Build the production pipeline: ONNX classifier plus configured enricher.
    pub fn from_config(config: &Config) -> Self {
        let classifier =
            OnnxClassifier::new(config.classifier.clone(), config.limits.clone());
        Self::new(
            Arc::new(classifier),
            LandmarkEnricher::from_config(&config.enrichment),
            config.limits.clone(),
        )
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> AppState {
        self.tx.borrow().state
    }

    /// The image registry backing published `ImageRef`s.
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Start loading the model in the background.
    ///
    /// Failures are logged and otherwise ignored; `predict` retries the load.
    pub fn preload(&self) -> tokio::task::JoinHandle<()> {
        let classifier = self.classifier.clone();
        tokio::spawn(async move {
            if let Err(e) = classifier.load_model().await {
                tracing::warn!("Model preload failed: {}", e.detail());
            }
        })
    }

    /// Run one scan to completion and return the final snapshot.
    ///
    /// Ignored (the handle is dropped) unless the pipeline is in HOME.
    pub async fn run(&self, handle: CaptureHandle) -> PipelineSnapshot {
        let Some((run_id, image)) = self.begin_run(handle) else {
            return self.snapshot();
        };

        match self.identify(&image).await {
            Ok(prediction) => {
                tracing::info!(
                    "Identified {} ({:.1}%)",
                    prediction.label,
                    prediction.confidence * 100.0
                );
                let label = prediction.label.clone();
                if self.apply(Some(run_id), Event::Accepted(prediction)) {
                    let record = self.enricher.enrich(&label).await;
                    self.apply(Some(run_id), Event::Enriched(record));
                }
            }
            Err(e) => {
                tracing::warn!("Scan failed: {}", e.detail());
                self.apply(Some(run_id), Event::Failed(e.to_string()));
            }
        }

        self.snapshot()
    }

    /// Dismiss the result. Returns whether the state changed.
    pub fn reset(&self) -> bool {
        self.apply(None, Event::Reset)
    }

    /// Leave the error screen. Returns whether the state changed.
    pub fn try_again(&self) -> bool {
        self.apply(None, Event::TryAgain)
    }

    /// Decode, classify and gate.
    async fn identify(&self, image: &ImageRef) -> PipelineResult<Prediction> {
        let decoded = self.decoder.decode(&self.images, image).await?;
        let predictions = self.classifier.predict(decoded).await?;
        if let Some(top) = get_top_prediction(&predictions) {
            tracing::debug!("Top prediction: {} ({:.4})", top.label, top.confidence);
        }
        gate::accept(get_top_prediction(&predictions))
    }

    /// Enter ANALYZING_IMAGE with a fresh run id and the registered image.
    fn begin_run(&self, handle: CaptureHandle) -> Option<(u64, ImageRef)> {
        let mut started = None;
        self.tx.send_if_modified(|snap| {
            let Some(next) = transition(snap.state, EventKind::Captured) else {
                tracing::debug!("Capture ignored in {}", snap.state);
                return false;
            };
            let image = self.images.register(handle);
            tracing::debug!("{} -> {} (run {})", snap.state, next, snap.run_id + 1);
            *snap = PipelineSnapshot {
                run_id: snap.run_id + 1,
                state: next,
                image: Some(image.clone()),
                ..PipelineSnapshot::default()
            };
            started = Some((snap.run_id, image));
            true
        });
        started
    }

    /// Apply `event` if the table allows it and `run_id` (when given) is current.
    fn apply(&self, run_id: Option<u64>, event: Event) -> bool {
        let kind = event.kind();
        self.tx.send_if_modified(|snap| {
            if let Some(id) = run_id {
                if id != snap.run_id {
                    tracing::debug!("Discarding stale {kind:?} from run {id} (current {})", snap.run_id);
                    return false;
                }
            }
            let Some(next) = transition(snap.state, kind) else {
                tracing::debug!("{kind:?} ignored in {}", snap.state);
                return false;
            };
            tracing::debug!("{} -> {} ({kind:?})", snap.state, next);

            match event {
                Event::Accepted(prediction) => snap.prediction = Some(prediction),
                Event::Failed(message) => snap.error = Some(message),
                Event::Enriched(record) => snap.record = Some(record),
                Event::Reset | Event::TryAgain => {
                    if let Some(image) = snap.image.take() {
                        self.images.revoke(&image);
                    }
                    snap.prediction = None;
                    snap.record = None;
                    snap.error = None;
                }
            }
            snap.state = next;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::error::{PipelineError, PipelineResult};
    use crate::pipeline::DecodedImage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedClassifier {
        predictions: Vec<Prediction>,
        loads: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn load_model(&self) -> PipelineResult<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::ModelLoad {
                detail: "offline".to_string(),
            })
        }

        fn is_loaded(&self) -> bool {
            false
        }

        async fn predict(&self, _image: DecodedImage) -> PipelineResult<Vec<Prediction>> {
            Ok(self.predictions.clone())
        }
    }

    fn pipeline(predictions: Vec<Prediction>) -> (LandmarkPipeline, Arc<AtomicU32>) {
        let loads = Arc::new(AtomicU32::new(0));
        let classifier = FixedClassifier {
            predictions,
            loads: loads.clone(),
        };
        let pipeline = LandmarkPipeline::new(
            Arc::new(classifier),
            LandmarkEnricher::fallback_only(),
            LimitsConfig::default(),
        );
        (pipeline, loads)
    }

    fn handle() -> CaptureHandle {
        CaptureHandle::new(b"not really an image".to_vec(), "image/jpeg", "x.jpg")
    }

    #[test]
    fn test_initial_snapshot_is_home() {
        let (pipeline, _) = pipeline(vec![]);
        assert_eq!(pipeline.snapshot(), PipelineSnapshot::default());
        assert_eq!(pipeline.state(), AppState::Home);
    }

    #[test]
    fn test_begin_run_publishes_image() {
        let (pipeline, _) = pipeline(vec![]);
        let (run_id, image) = pipeline.begin_run(handle()).unwrap();
        let snap = pipeline.snapshot();
        assert_eq!(run_id, 1);
        assert_eq!(snap.state, AppState::AnalyzingImage);
        assert_eq!(snap.image.as_ref(), Some(&image));
        assert!(pipeline.images().resolve(&image).is_some());
    }

    #[test]
    fn test_begin_run_outside_home_is_ignored() {
        let (pipeline, _) = pipeline(vec![]);
        pipeline.begin_run(handle()).unwrap();
        assert!(pipeline.begin_run(handle()).is_none());
        assert_eq!(pipeline.images().live_count(), 1);
        assert_eq!(pipeline.snapshot().run_id, 1);
    }

    #[test]
    fn test_stale_run_result_discarded() {
        let (pipeline, _) = pipeline(vec![]);
        let (run_id, _) = pipeline.begin_run(handle()).unwrap();
        assert!(pipeline.apply(Some(run_id), Event::Failed("boom".to_string())));
        assert!(pipeline.try_again());

        let (next_id, _) = pipeline.begin_run(handle()).unwrap();
        assert_eq!(next_id, run_id + 1);

        // A late result from the first run must not move the second one
        let late = Event::Accepted(Prediction::new("Eiffel Tower", 0.9));
        assert!(!pipeline.apply(Some(run_id), late));
        let snap = pipeline.snapshot();
        assert_eq!(snap.state, AppState::AnalyzingImage);
        assert!(snap.prediction.is_none());
    }

    #[test]
    fn test_user_actions_ignored_while_busy() {
        let (pipeline, _) = pipeline(vec![]);
        pipeline.begin_run(handle()).unwrap();
        assert!(!pipeline.reset());
        assert!(!pipeline.try_again());
        assert_eq!(pipeline.state(), AppState::AnalyzingImage);
    }

    #[tokio::test]
    async fn test_undecodable_capture_ends_in_error() {
        let (pipeline, _) = pipeline(vec![Prediction::new("Eiffel Tower", 0.99)]);
        let snap = pipeline.run(handle()).await;
        assert_eq!(snap.state, AppState::Error);
        assert!(snap.error.is_some());
        assert!(snap.record.is_none());

        assert!(pipeline.try_again());
        assert_eq!(pipeline.images().live_count(), 0);
        assert_eq!(pipeline.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_preload_failure_leaves_state_alone() {
        let (pipeline, loads) = pipeline(vec![]);
        let rx = pipeline.subscribe();
        pipeline.preload().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(pipeline.state(), AppState::Home);
    }
}
