//! Photo post-processing
//!
//! Pure functions over images and artifacts: orientation fixes, crops,
//! resizing and size-bounded compression. They can be chained in any order.

use super::encoding::{decode, encode, EncodingFormat};
use super::PhotoArtifact;
use crate::utils::error::CameraResult;
use image::imageops::FilterType;
use image::DynamicImage;

/// Flip horizontally, matching the mirrored selfie preview
pub fn mirror(image: DynamicImage) -> DynamicImage {
    image.fliph()
}

/// Clockwise rotation that turns a frame captured at `angle` upright.
///
/// The angle is the screen rotation reported by the orientation sensor;
/// values that are not multiples of 90 snap to the nearest one.
pub fn upright_rotation(angle: u16) -> u16 {
    let snapped = ((u32::from(angle) + 45) / 90 * 90) % 360;
    ((360 - snapped) % 360) as u16
}

/// Rotate so a frame captured at sensor `angle` comes out upright
pub fn rotate_upright(image: DynamicImage, angle: u16) -> DynamicImage {
    match upright_rotation(angle) {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

/// Centre crop to the `aspect_width:aspect_height` ratio.
///
/// A zero ratio component leaves the image untouched.
pub fn crop_to_aspect(image: &DynamicImage, aspect_width: u32, aspect_height: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if aspect_width == 0 || aspect_height == 0 || width == 0 || height == 0 {
        return image.clone();
    }

    let target = f64::from(aspect_width) / f64::from(aspect_height);
    let current = f64::from(width) / f64::from(height);

    if (current - target).abs() < f64::EPSILON {
        return image.clone();
    }

    if current > target {
        let new_width = ((f64::from(height) * target).round() as u32).clamp(1, width);
        let x = (width - new_width) / 2;
        image.crop_imm(x, 0, new_width, height)
    } else {
        let new_height = ((f64::from(width) / target).round() as u32).clamp(1, height);
        let y = (height - new_height) / 2;
        image.crop_imm(0, y, width, new_height)
    }
}

/// Centre crop to a square
pub fn crop_to_square(image: &DynamicImage) -> DynamicImage {
    crop_to_aspect(image, 1, 1)
}

fn fits(width: u32, height: u32, max_dimension: u32) -> bool {
    max_dimension == 0 || width.max(height) <= max_dimension
}

/// Downscale so the longest side is at most `max_dimension` (0 = unlimited).
///
/// Never upscales.
pub fn resize_to_fit(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    if fits(image.width(), image.height(), max_dimension) {
        return image;
    }
    image.resize(max_dimension, max_dimension, FilterType::Triangle)
}

/// Shrink an artifact to `max_dimension` and re-encode it as JPEG.
///
/// The original artifact comes back unchanged unless the new encoding is
/// strictly smaller. An artifact that already fits and was already encoded
/// at `quality` or lower is returned as is, so repeated calls are stable.
pub fn compress(artifact: &PhotoArtifact, max_dimension: u32, quality: u8) -> CameraResult<PhotoArtifact> {
    let quality = quality.clamp(1, 100);

    let already_minimal = fits(artifact.width, artifact.height, max_dimension)
        && artifact.quality.is_some_and(|q| q <= quality);
    if already_minimal {
        tracing::debug!("Artifact already compressed at quality {:?}", artifact.quality);
        return Ok(artifact.clone());
    }

    let image = resize_to_fit(decode(&artifact.data)?, max_dimension);
    let data = encode(&image, EncodingFormat::Jpeg, quality)?;

    if data.len() < artifact.data.len() {
        tracing::info!(
            "Compressed photo {} -> {} bytes ({}x{}, quality {})",
            artifact.data.len(),
            data.len(),
            image.width(),
            image.height(),
            quality
        );
        Ok(PhotoArtifact {
            data,
            mime: EncodingFormat::Jpeg.mime().to_string(),
            width: image.width(),
            height: image.height(),
            quality: Some(quality),
        })
    } else {
        tracing::debug!(
            "Compression would not shrink photo ({} >= {} bytes), keeping original",
            data.len(),
            artifact.data.len()
        );
        Ok(artifact.clone())
    }
}
