//! Image acquisition: camera snapshots and file picks.
//!
//! Both modes produce a `CaptureHandle`, a single still image that the
//! pipeline consumes exactly once.

pub mod camera;
pub mod snapshot;

pub use camera::{CameraBackend, CameraSession, Facing, Frame, FrameSource};
pub use snapshot::SnapshotCamera;

use std::path::Path;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};

use crate::config::CameraConfig;
use crate::error::{PipelineError, PipelineResult};

/// File name given to camera snapshots.
pub const CAPTURED_FILE_NAME: &str = "captured_photo.jpg";

/// One acquired still image, pre-decode.
pub struct CaptureHandle {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: String,
}

impl CaptureHandle {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, String, String) {
        (self.bytes, self.mime_type, self.file_name)
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Owns the camera session (at most one) and produces capture handles.
pub struct CaptureProvider {
    backend: Option<Arc<dyn CameraBackend>>,
    facing: Facing,
    jpeg_quality: u8,
    session: Option<CameraSession>,
}

impl std::fmt::Debug for CaptureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureProvider")
            .field("has_backend", &self.backend.is_some())
            .field("facing", &self.facing)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl CaptureProvider {
    pub fn new(backend: Option<Arc<dyn CameraBackend>>, config: &CameraConfig) -> Self {
        Self {
            backend,
            facing: config.prefer_facing.parse().unwrap_or_default(),
            jpeg_quality: config.jpeg_quality,
            session: None,
        }
    }

    /// Build a provider backed by the configured snapshot cameras, if any.
    pub fn from_config(config: &CameraConfig) -> Self {
        let backend: Option<Arc<dyn CameraBackend>> = if config.devices.is_empty() {
            None
        } else {
            Some(Arc::new(SnapshotCamera::new(config.devices.clone())))
        };
        Self::new(backend, config)
    }

    pub fn has_camera(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_camera_open(&self) -> bool {
        self.session.as_ref().is_some_and(CameraSession::is_open)
    }

    /// Open the camera, releasing any session left over from before.
    pub async fn open_camera(&mut self) -> PipelineResult<()> {
        self.release_camera();

        let backend = self
            .backend
            .clone()
            .ok_or_else(|| PipelineError::CameraAccess {
                detail: "no camera backend configured".to_string(),
            })?;

        match backend.open(self.facing).await {
            Ok(source) => {
                self.session = Some(CameraSession::new(source));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Camera access failed ({}): {}", backend.name(), e.detail());
                Err(e)
            }
        }
    }

    /// Latest live frame from the open camera.
    pub async fn preview(&mut self) -> PipelineResult<Frame> {
        match self.session.as_mut() {
            Some(session) => session.frame().await,
            None => Err(not_open()),
        }
    }

    /// Take one still frame, encode it as JPEG, and release the camera.
    ///
    /// The camera is released whether or not the snap succeeds.
    pub async fn snap(&mut self) -> PipelineResult<CaptureHandle> {
        let mut session = self.session.take().ok_or_else(not_open)?;
        let frame = session.frame().await;
        session.release();

        let frame = frame?;
        let bytes = encode_jpeg(&frame, self.jpeg_quality)?;
        tracing::debug!(
            "Snapped {}x{} frame ({} bytes)",
            frame.width,
            frame.height,
            bytes.len()
        );
        Ok(CaptureHandle::new(bytes, "image/jpeg", CAPTURED_FILE_NAME))
    }

    /// Close the camera without emitting a handle.
    pub fn cancel(&mut self) {
        self.release_camera();
    }

    fn release_camera(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }

    /// Accept a user-picked file. `None` means the picker was dismissed.
    ///
    /// The bytes are taken as-is; format problems surface in the decode step.
    pub async fn pick_file(&self, path: Option<&Path>) -> PipelineResult<Option<CaptureHandle>> {
        let Some(path) = path else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
            _ => PipelineError::Decode {
                file_name: path.display().to_string(),
                detail: format!("Cannot read file: {e}"),
            },
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("picked_image")
            .to_string();
        let mime_type = guess_mime_type(&bytes, path);

        Ok(Some(CaptureHandle::new(bytes, mime_type, file_name)))
    }
}

fn not_open() -> PipelineError {
    PipelineError::CameraAccess {
        detail: "camera is not open".to_string(),
    }
}

/// Guess MIME type from content, falling back to the file extension.
fn guess_mime_type(bytes: &[u8], path: &Path) -> String {
    image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(path))
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

fn encode_jpeg(frame: &Frame, quality: u8) -> PipelineResult<Vec<u8>> {
    if !frame.is_well_formed() {
        return Err(PipelineError::Decode {
            file_name: CAPTURED_FILE_NAME.to_string(),
            detail: format!("malformed frame {frame:?}"),
        });
    }

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(&frame.rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| PipelineError::Decode {
            file_name: CAPTURED_FILE_NAME.to_string(),
            detail: format!("JPEG encode failed: {e}"),
        })?;
    Ok(buf)
}
