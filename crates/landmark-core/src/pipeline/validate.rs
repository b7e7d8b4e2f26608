//! Cheap checks on image bytes before a full decode.

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates captured image bytes before decoding.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Checks:
    /// - Byte length is within limits
    /// - Bytes start with a known image signature
    pub fn validate(&self, bytes: &[u8], file_name: &str) -> Result<(), PipelineError> {
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::FileTooLarge {
                file_name: file_name.to_string(),
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        if bytes.len() < 4 {
            return Err(PipelineError::Decode {
                file_name: file_name.to_string(),
                detail: "File too small to be a valid image".to_string(),
            });
        }

        if !is_valid_image_header(bytes) {
            return Err(PipelineError::Decode {
                file_name: file_name.to_string(),
                detail: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }
}

/// Whether the leading bytes match a format the decoder can handle.
fn is_valid_image_header(bytes: &[u8]) -> bool {
    match bytes {
        // JPEG
        [0xFF, 0xD8, 0xFF, ..] => true,
        // PNG
        [0x89, b'P', b'N', b'G', ..] => true,
        // GIF
        [b'G', b'I', b'F', b'8', ..] => true,
        // WebP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => true,
        [b'R', b'I', b'F', b'F', rest @ ..] if rest.len() < 8 => true,
        // BMP
        [b'B', b'M', ..] => true,
        // TIFF, little- and big-endian, version 42
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
        _ => false,
    }
}
