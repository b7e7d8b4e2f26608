//! Camera device abstraction and the scoped `CameraSession` handle.
//!
//! A backend opens a device and hands back a `FrameSource`. The session wraps
//! that source and guarantees `stop()` runs exactly once: on explicit release,
//! after a snap, on cancel, or when the session is dropped.

use std::str::FromStr;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::{PipelineError, PipelineResult};

/// Which way the sensor faces. Rear cameras are `Environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    #[default]
    Environment,
    User,
}

impl Facing {
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" => Ok(Facing::Environment),
            "user" => Ok(Facing::User),
            other => Err(format!("unknown camera facing: {other}")),
        }
    }
}

/// One raw RGB8 frame at the device's native resolution.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB bytes, row-major, `width * height * 3` long
    pub rgb: Vec<u8>,
}

impl Frame {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            width,
            height,
            rgb: rgb.into_raw(),
        }
    }

    /// Whether the buffer length matches the stated dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgb.len() == self.width as usize * self.height as usize * 3
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

/// A capture device API: request access with a facing hint.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Request exclusive access to a device, preferring `facing`.
    ///
    /// Denied or unavailable devices return `PipelineError::CameraAccess`.
    async fn open(&self, facing: Facing) -> PipelineResult<Box<dyn FrameSource>>;
}

/// A live frame source handed out by a `CameraBackend`.
#[async_trait]
pub trait FrameSource: Send {
    /// Device name for logging.
    fn device_name(&self) -> &str;

    /// Grab the current frame.
    async fn next_frame(&mut self) -> PipelineResult<Frame>;

    /// Stop the device. `CameraSession` calls this at most once.
    fn stop(&mut self);
}

/// The live device handle. Released on every exit path.
pub struct CameraSession {
    source: Option<Box<dyn FrameSource>>,
}

impl CameraSession {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        tracing::debug!("Camera session opened: {}", source.device_name());
        Self {
            source: Some(source),
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.source.as_deref().map(|s| s.device_name())
    }

    /// Grab a frame from the open device.
    pub async fn frame(&mut self) -> PipelineResult<Frame> {
        match self.source.as_mut() {
            Some(source) => source.next_frame().await,
            None => Err(PipelineError::CameraAccess {
                detail: "camera session already released".to_string(),
            }),
        }
    }

    /// Stop the device. Releasing an already-released session is a no-op.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            tracing::debug!("Camera session released: {}", source.device_name());
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
