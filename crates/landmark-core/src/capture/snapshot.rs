//! Network camera backend for devices exposing a still-image snapshot URL.
//!
//! Many IP cameras and phone webcam apps serve the current frame as a JPEG on
//! a plain GET. Each `next_frame` fetches and decodes one such image.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::camera::{CameraBackend, Facing, Frame, FrameSource};
use crate::config::{CameraDeviceConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};

/// Snapshot-URL camera backend.
pub struct SnapshotCamera {
    client: reqwest::Client,
    devices: Vec<CameraDeviceConfig>,
    timeout: Duration,
    max_bytes: u64,
}

impl SnapshotCamera {
    pub fn new(devices: Vec<CameraDeviceConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            devices,
            timeout: Duration::from_secs(10),
            max_bytes: LimitsConfig::default().max_file_size_mb * 1024 * 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Largest snapshot body accepted from a device.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Pick the first device facing the preferred way, else the first device.
    fn select(&self, facing: Facing) -> Option<&CameraDeviceConfig> {
        self.devices
            .iter()
            .find(|d| d.facing == facing.as_str())
            .or_else(|| self.devices.first())
    }
}

#[async_trait]
impl CameraBackend for SnapshotCamera {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn open(&self, facing: Facing) -> PipelineResult<Box<dyn FrameSource>> {
        let device = self.select(facing).ok_or_else(|| PipelineError::CameraAccess {
            detail: "no camera devices configured".to_string(),
        })?;

        let mut source = SnapshotSource {
            client: self.client.clone(),
            device: device.clone(),
            timeout: self.timeout,
            max_bytes: self.max_bytes,
            stopped: false,
        };

        // Fetch once so denied/unreachable devices fail at open, not at snap.
        source.next_frame().await?;
        tracing::info!("Opened camera {:?} ({})", device.name, device.facing);

        Ok(Box::new(source))
    }
}

/// A live snapshot stream for one device.
struct SnapshotSource {
    client: reqwest::Client,
    device: CameraDeviceConfig,
    timeout: Duration,
    max_bytes: u64,
    stopped: bool,
}

impl SnapshotSource {
    fn check_size(&self, size: u64) -> PipelineResult<()> {
        if size > self.max_bytes {
            return Err(PipelineError::CameraAccess {
                detail: format!(
                    "camera {} frame exceeds {} bytes",
                    self.device.name, self.max_bytes
                ),
            });
        }
        Ok(())
    }

    /// Read the body, stopping as soon as it passes `max_bytes`.
    async fn read_body(&self, resp: reqwest::Response) -> PipelineResult<Vec<u8>> {
        if let Some(size) = resp.content_length() {
            self.check_size(size)?;
        }

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::CameraAccess {
                detail: format!("camera {} read failed: {e}", self.device.name),
            })?;
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64)?;
        }
        Ok(bytes)
    }
}

#[async_trait]
impl FrameSource for SnapshotSource {
    fn device_name(&self) -> &str {
        &self.device.name
    }

    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        if self.stopped {
            return Err(PipelineError::CameraAccess {
                detail: format!("camera {} is stopped", self.device.name),
            });
        }

        let resp = self
            .client
            .get(&self.device.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::CameraAccess {
                detail: format!("camera {} unreachable: {e}", self.device.name),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let reason = match status.as_u16() {
                401 | 403 => "permission denied",
                _ => "device error",
            };
            return Err(PipelineError::CameraAccess {
                detail: format!("camera {} HTTP {status}: {reason}", self.device.name),
            });
        }

        let bytes = self.read_body(resp).await?;

        let name = self.device.name.clone();
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| Frame::from_image(&img))
                .map_err(|e| PipelineError::CameraAccess {
                    detail: format!("camera {name} sent an undecodable frame: {e}"),
                })
        })
        .await
        .map_err(|e| PipelineError::CameraAccess {
            detail: format!("Task join error: {e}"),
        })?
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
