//! Photo encoding
//!
//! Encodes processed frames to JPEG (with quality control) or PNG, and
//! decodes artifacts back for post-processing.

use crate::utils::error::{CameraError, CameraResult};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    #[default]
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// MIME type of the encoded bytes
    pub fn mime(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "image/jpeg",
            EncodingFormat::Png => "image/png",
        }
    }
}

/// Encode an image.
///
/// `quality` (1-100) only affects JPEG. Alpha is dropped for JPEG.
pub fn encode(image: &DynamicImage, format: EncodingFormat, quality: u8) -> CameraResult<Vec<u8>> {
    let mut buffer = Vec::new();

    match format {
        EncodingFormat::Jpeg => {
            let rgb = image.to_rgb8();
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut buffer,
                quality.clamp(1, 100),
            );
            encoder
                .encode(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| CameraError::EncodeFailed(format!("JPEG encoding failed: {e}")))?;
        }
        EncodingFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                .map_err(|e| CameraError::EncodeFailed(format!("PNG encoding failed: {e}")))?;
        }
    }

    if buffer.is_empty() {
        return Err(CameraError::EncodeFailed(format!(
            "{} encoder produced no data",
            format.extension()
        )));
    }

    tracing::debug!(size = buffer.len(), format = ?format, "Encoding complete");
    Ok(buffer)
}

/// Decode encoded image bytes
pub fn decode(data: &[u8]) -> CameraResult<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| CameraError::EncodeFailed(format!("cannot decode image: {e}")))
}
