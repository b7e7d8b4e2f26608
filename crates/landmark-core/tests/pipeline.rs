//! End-to-end scan scenarios with fake classifier, provider and camera.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::watch;

use landmark_core::capture::{
    CameraBackend, Facing, Frame, FrameSource, CAPTURED_FILE_NAME,
};
use landmark_core::config::{CameraConfig, LimitsConfig};
use landmark_core::llm::{EnrichOptions, LlmProvider, LlmRequest, LlmResponse};
use landmark_core::pipeline::DecodedImage;
use landmark_core::{
    AppState, CaptureHandle, CaptureProvider, Classifier, LandmarkEnricher, LandmarkPipeline,
    LandmarkRecord, PipelineError, PipelineResult, PipelineSnapshot, Prediction,
};

const EIFFEL_JSON: &str = r#"{
    "name": "Eiffel Tower",
    "history": "It was built for the 1889 World's Fair in Paris.",
    "funFacts": ["It grows about 15 cm in summer!", "It has 1,665 steps.", "It was once red!"],
    "architecture": "A giant iron lattice shaped like a letter A.",
    "visitInfo": "Go at night to see it sparkle."
}"#;

// --- Fakes ---

/// Records the published state whenever a collaborator is invoked.
#[derive(Clone, Default)]
struct StateLog {
    rx: Arc<OnceLock<watch::Receiver<PipelineSnapshot>>>,
    seen: Arc<Mutex<Vec<AppState>>>,
}

impl StateLog {
    fn attach(&self, pipeline: &LandmarkPipeline) {
        let _ = self.rx.set(pipeline.subscribe());
    }

    fn record(&self) {
        if let Some(rx) = self.rx.get() {
            self.seen.lock().unwrap().push(rx.borrow().state);
        }
    }

    fn seen(&self) -> Vec<AppState> {
        self.seen.lock().unwrap().clone()
    }
}

struct FakeClassifier {
    predictions: Option<Vec<Prediction>>,
    calls: Arc<AtomicU32>,
    states: StateLog,
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn load_model(&self) -> PipelineResult<()> {
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        true
    }

    async fn predict(&self, image: DecodedImage) -> PipelineResult<Vec<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.states.record();
        assert!(image.width > 0 && image.height > 0);
        self.predictions
            .clone()
            .ok_or_else(|| PipelineError::Prediction {
                detail: "tensor shape mismatch".to_string(),
            })
    }
}

struct MockProvider {
    outcome: Result<String, Option<u16>>,
    calls: Arc<AtomicU32>,
    states: StateLog,
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.states.record();
        assert!(request.prompt.contains("tour guide"));
        match &self.outcome {
            Ok(text) => Ok(LlmResponse {
                text: text.clone(),
                model: "mock-v1".to_string(),
                tokens_used: None,
                latency_ms: 1,
            }),
            Err(Some(code)) => Err(PipelineError::Llm {
                message: format!("HTTP {code}"),
                status_code: Some(*code),
            }),
            Err(None) => Err(PipelineError::Unreachable {
                service: "mock".to_string(),
                detail: "error sending request for url (http://127.0.0.1:9/)".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct FakeCamera {
    opens: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    deny: bool,
}

struct FakeSource {
    stops: Arc<AtomicU32>,
}

#[async_trait]
impl CameraBackend for FakeCamera {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self, facing: Facing) -> PipelineResult<Box<dyn FrameSource>> {
        assert_eq!(facing, Facing::Environment);
        if self.deny {
            return Err(PipelineError::CameraAccess {
                detail: "NotAllowedError".to_string(),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            stops: self.stops.clone(),
        }))
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    fn device_name(&self) -> &str {
        "fake-rear"
    }

    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        Ok(Frame::from_image(&test_image(64, 48)))
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Harness ---

struct Harness {
    pipeline: LandmarkPipeline,
    classifier_calls: Arc<AtomicU32>,
    provider_calls: Arc<AtomicU32>,
    states: StateLog,
}

fn harness(predictions: Option<Vec<Prediction>>, outcome: Result<String, Option<u16>>) -> Harness {
    let states = StateLog::default();
    let classifier_calls = Arc::new(AtomicU32::new(0));
    let provider_calls = Arc::new(AtomicU32::new(0));

    let classifier = FakeClassifier {
        predictions,
        calls: classifier_calls.clone(),
        states: states.clone(),
    };
    let provider = MockProvider {
        outcome,
        calls: provider_calls.clone(),
        states: states.clone(),
    };
    let options = EnrichOptions {
        timeout_ms: 5000,
        retry_attempts: 1,
        retry_delay_ms: 1,
    };

    let pipeline = LandmarkPipeline::new(
        Arc::new(classifier),
        LandmarkEnricher::new(Box::new(provider), options),
        LimitsConfig::default(),
    );
    states.attach(&pipeline);

    Harness {
        pipeline,
        classifier_calls,
        provider_calls,
        states,
    }
}

fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 4) as u8, (y * 4) as u8, 128])
    }))
}

fn png_bytes() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    test_image(32, 24).write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Pick a real file through the capture provider, like the file-pick mode does.
async fn picked_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> CaptureHandle {
    let path: PathBuf = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    let provider = CaptureProvider::new(None, &CameraConfig::default());
    provider.pick_file(Some(&path)).await.unwrap().unwrap()
}

// --- Scenarios ---

#[tokio::test]
async fn scenario_a_confident_prediction_reaches_result() {
    let h = harness(
        Some(vec![
            Prediction::new("Eiffel Tower", 0.92),
            Prediction::new("Big Ben", 0.05),
        ]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let dir = tempfile::tempdir().unwrap();
    let handle = picked_file(&dir, "tower.png", &png_bytes()).await;
    assert_eq!(handle.mime_type(), "image/png");

    let snap = h.pipeline.run(handle).await;

    assert_eq!(snap.state, AppState::Result);
    assert_eq!(snap.record.as_ref().unwrap().name, "Eiffel Tower");
    assert_eq!(snap.record.as_ref().unwrap().fun_facts.len(), 3);
    assert_eq!(snap.prediction, Some(Prediction::new("Eiffel Tower", 0.92)));
    assert!(snap.error.is_none());

    // Classification ran while ANALYZING, enrichment while FETCHING
    assert_eq!(
        h.states.seen(),
        vec![AppState::AnalyzingImage, AppState::FetchingInfo]
    );

    // The image stays displayable in RESULT
    let image = snap.image.unwrap();
    assert_eq!(image.file_name(), "tower.png");
    assert!(h.pipeline.images().resolve(&image).is_some());
}

#[tokio::test]
async fn scenario_b_low_confidence_reaches_error() {
    let h = harness(
        Some(vec![Prediction::new("Blurry Object", 0.31)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let dir = tempfile::tempdir().unwrap();
    let handle = picked_file(&dir, "blurry.jpg", &png_bytes()).await;

    let snap = h.pipeline.run(handle).await;

    assert_eq!(snap.state, AppState::Error);
    assert!(snap.error.unwrap().contains("try getting closer"));
    assert!(snap.record.is_none());
    assert_eq!(h.provider_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_c_enrichment_failure_still_reaches_result() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Err(None),
    );
    let dir = tempfile::tempdir().unwrap();
    let handle = picked_file(&dir, "tower.png", &png_bytes()).await;

    let snap = h.pipeline.run(handle).await;

    assert_eq!(snap.state, AppState::Result);
    assert_eq!(snap.record, Some(LandmarkRecord::fallback("Eiffel Tower")));
    assert!(snap.error.is_none());
    // Connection errors are transient: one retry, then fallback
    assert_eq!(h.provider_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn camera_cancel_never_decodes_or_classifies() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let camera = FakeCamera::default();
    let stops = camera.stops.clone();
    let mut capture = CaptureProvider::new(Some(Arc::new(camera)), &CameraConfig::default());

    capture.open_camera().await.unwrap();
    let frame = capture.preview().await.unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));
    capture.cancel();

    assert!(!capture.is_camera_open());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.state(), AppState::Home);
    assert_eq!(h.classifier_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.pipeline.images().live_count(), 0);
}

#[tokio::test]
async fn camera_snap_runs_full_pipeline() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.75)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let camera = FakeCamera::default();
    let (opens, stops) = (camera.opens.clone(), camera.stops.clone());
    let mut capture = CaptureProvider::new(Some(Arc::new(camera)), &CameraConfig::default());

    capture.open_camera().await.unwrap();
    let handle = capture.snap().await.unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    let snap = h.pipeline.run(handle).await;
    assert_eq!(snap.state, AppState::Result);
    assert_eq!(snap.image.unwrap().file_name(), CAPTURED_FILE_NAME);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn camera_access_denied_stays_home() {
    let h = harness(Some(vec![]), Ok(EIFFEL_JSON.to_string()));
    let camera = FakeCamera {
        deny: true,
        ..FakeCamera::default()
    };
    let mut capture = CaptureProvider::new(Some(Arc::new(camera)), &CameraConfig::default());

    let err = capture.open_camera().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not access camera. Please check permissions."
    );
    assert!(!capture.is_camera_open());
    assert_eq!(h.pipeline.state(), AppState::Home);
}

#[tokio::test]
async fn broken_image_reaches_error_without_classifying() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let mut bytes = png_bytes();
    bytes.truncate(24);

    let snap = h
        .pipeline
        .run(CaptureHandle::new(bytes, "image/png", "broken.png"))
        .await;

    assert_eq!(snap.state, AppState::Error);
    assert!(snap.error.is_some());
    assert_eq!(h.classifier_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn prediction_failure_reaches_error() {
    let h = harness(None, Ok(EIFFEL_JSON.to_string()));
    let snap = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "tower.png"))
        .await;

    assert_eq!(snap.state, AppState::Error);
    assert_eq!(
        snap.error.as_deref(),
        Some("Oops! Couldn't recognize that image.")
    );
}

#[tokio::test]
async fn empty_predictions_are_low_confidence() {
    let h = harness(Some(vec![]), Ok(EIFFEL_JSON.to_string()));
    let snap = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "tower.png"))
        .await;

    assert_eq!(snap.state, AppState::Error);
    assert!(snap.error.unwrap().contains("try getting closer"));
}

#[tokio::test]
async fn reset_and_try_again_release_every_image() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    h.pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "a.png"))
        .await;
    assert_eq!(h.pipeline.images().live_count(), 1);
    assert!(h.pipeline.reset());
    assert_eq!(h.pipeline.images().live_count(), 0);
    assert_eq!(h.pipeline.snapshot().record, None);

    let low = harness(
        Some(vec![Prediction::new("Blurry Object", 0.31)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    low.pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "b.png"))
        .await;
    assert_eq!(low.pipeline.images().live_count(), 1);
    assert!(low.pipeline.try_again());
    assert_eq!(low.pipeline.images().live_count(), 0);
    assert_eq!(low.pipeline.snapshot().error, None);
    assert_eq!(low.pipeline.state(), AppState::Home);
}

#[tokio::test]
async fn run_outside_home_is_ignored() {
    let h = harness(
        Some(vec![Prediction::new("Blurry Object", 0.31)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let first = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "a.png"))
        .await;
    assert_eq!(first.state, AppState::Error);

    let second = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "b.png"))
        .await;
    assert_eq!(second, first);
    assert_eq!(h.classifier_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.pipeline.images().live_count(), 1);
}

#[tokio::test]
async fn wrong_actions_do_not_leave_terminal_states() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    h.pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "a.png"))
        .await;
    // RESULT only leaves through reset
    assert!(!h.pipeline.try_again());
    assert_eq!(h.pipeline.state(), AppState::Result);

    let low = harness(Some(vec![]), Ok(EIFFEL_JSON.to_string()));
    low.pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "b.png"))
        .await;
    // ERROR only leaves through try-again
    assert!(!low.pipeline.reset());
    assert_eq!(low.pipeline.state(), AppState::Error);
}

#[tokio::test]
async fn second_run_after_reset_gets_new_run_id() {
    let h = harness(
        Some(vec![Prediction::new("Eiffel Tower", 0.92)]),
        Ok(EIFFEL_JSON.to_string()),
    );
    let first = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "a.png"))
        .await;
    h.pipeline.reset();
    let second = h
        .pipeline
        .run(CaptureHandle::new(png_bytes(), "image/png", "b.png"))
        .await;

    assert_eq!(second.state, AppState::Result);
    assert_eq!(second.run_id, first.run_id + 1);
    assert_ne!(second.image, first.image);
    assert_eq!(h.pipeline.images().live_count(), 1);
}
