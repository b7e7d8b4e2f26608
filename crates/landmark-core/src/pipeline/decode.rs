//! Image decoding with format detection, validation, and timeout support.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tokio::time::timeout;

use super::store::{ImageRef, ImageStore};
use super::validate::Validator;
use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
    validator: Validator,
}

/// A fully decoded, pixel-addressable image ready for classification.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Encoded size in bytes
    pub byte_len: u64,
}

impl DecodedImage {
    /// Wrap an already-decoded image.
    pub fn from_image(image: DynamicImage, format: ImageFormat) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            format,
            width,
            height,
            byte_len: 0,
        }
    }
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            validator: Validator::new(limits.clone()),
            limits,
        }
    }

    /// Decode a registered image, waiting until decoding completes or fails.
    pub async fn decode(
        &self,
        store: &ImageStore,
        image: &ImageRef,
    ) -> Result<DecodedImage, PipelineError> {
        let bytes = store.resolve(image).ok_or_else(|| PipelineError::Decode {
            file_name: image.file_name().to_string(),
            detail: format!("{image} was released before decoding"),
        })?;
        self.decode_bytes(bytes, image.file_name()).await
    }

    /// Validate and decode shared bytes off the async runtime.
    pub async fn decode_bytes(
        &self,
        bytes: Arc<[u8]>,
        file_name: &str,
    ) -> Result<DecodedImage, PipelineError> {
        self.validator.validate(&bytes, file_name)?;

        let name_owned = file_name.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || decode_bytes_sync(bytes, &name_owned)).await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        file_name: file_name.to_string(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                tracing::debug!(
                    "Decoded {} ({}x{} {})",
                    file_name,
                    decoded.width,
                    decoded.height,
                    format_to_string(decoded.format)
                );
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                file_name: file_name.to_string(),
                detail: format!("Task join error: {e}"),
            }),
            Err(_) => Err(PipelineError::Timeout {
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }
}

/// Synchronous decode from bytes (runs in spawn_blocking).
fn decode_bytes_sync(bytes: Arc<[u8]>, file_name: &str) -> Result<DecodedImage, PipelineError> {
    let byte_len = bytes.len() as u64;
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            file_name: file_name.to_string(),
            detail: format!("Cannot detect image format: {e}"),
        })?;

    let format = match reader.format() {
        Some(f) => f,
        None => ImageFormat::from_path(file_name).map_err(|_| PipelineError::UnsupportedFormat {
            file_name: file_name.to_string(),
            format: std::path::Path::new(file_name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })?,
    };

    let image = reader.decode().map_err(|e| PipelineError::Decode {
        file_name: file_name.to_string(),
        detail: e.to_string(),
    })?;

    let mut decoded = DecodedImage::from_image(image, format);
    decoded.byte_len = byte_len;
    Ok(decoded)
}

/// Convert an ImageFormat to a short string.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        _ => "unknown",
    }
}
