//! Photo capture pipeline
//!
//! Grabs a full-resolution frame from the track when the platform allows it,
//! otherwise snapshots the preview. The frame is then mirrored and rotated to
//! match what the user saw, and encoded off the async runtime.

use super::encoding::{encode, EncodingFormat};
use super::processing::{mirror, rotate_upright};
use super::PhotoArtifact;
use crate::capture::{CaptureSession, FacingMode, OrientationSource, PreviewSurface, VideoTrack};
use crate::settings::PhotoSettings;
use crate::utils::error::{CameraError, CameraResult};
use image::{DynamicImage, RgbaImage};

/// Turns the live stream into encoded stills
#[derive(Debug, Clone, Default)]
pub struct PhotoPipeline {
    settings: PhotoSettings,
}

impl PhotoPipeline {
    pub fn new(settings: PhotoSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PhotoSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PhotoSettings) {
        self.settings = settings;
    }

    /// Take a photo from the session's live track
    pub async fn capture(
        &self,
        session: &CaptureSession,
        preview: &dyn PreviewSurface,
        orientation: &dyn OrientationSource,
    ) -> CameraResult<PhotoArtifact> {
        let track = session
            .video_track()
            .filter(|t| t.is_live())
            .ok_or(CameraError::NoActiveStream)?;

        let frame = self.grab(track.as_ref(), preview).await?;
        let facing = session.facing_mode();
        let angle = if self.settings.auto_rotate {
            orientation.angle()
        } else {
            0
        };
        let settings = self.settings.clone();

        tracing::debug!(
            "Processing {}x{} frame (facing={:?}, angle={})",
            frame.width(),
            frame.height(),
            facing,
            angle
        );

        tokio::task::spawn_blocking(move || develop(frame, facing, angle, &settings))
            .await
            .map_err(|e| CameraError::EncodeFailed(format!("encoding task failed: {e}")))?
    }

    async fn grab(&self, track: &dyn VideoTrack, preview: &dyn PreviewSurface) -> CameraResult<RgbaImage> {
        if self.settings.enhanced_grab {
            match track.grab_frame().await {
                Ok(frame) if frame.width() > 0 && frame.height() > 0 => {
                    tracing::debug!("Captured frame from track {}", track.id());
                    return Ok(frame);
                }
                Ok(_) => tracing::warn!("Frame grab returned an empty image, using preview"),
                Err(e) => tracing::warn!("Frame grab unavailable ({}), using preview", e),
            }
        }

        preview
            .snapshot()
            .filter(|f| f.width() > 0 && f.height() > 0)
            .ok_or(CameraError::NoActiveStream)
    }
}

fn develop(
    frame: RgbaImage,
    facing: FacingMode,
    angle: u16,
    settings: &PhotoSettings,
) -> CameraResult<PhotoArtifact> {
    let mut image = DynamicImage::ImageRgba8(frame);
    if settings.mirror_user_facing && facing == FacingMode::User {
        image = mirror(image);
    }
    image = rotate_upright(image, angle);

    let format = settings.format;
    let data = encode(&image, format, settings.jpeg_quality)?;
    let quality = match format {
        EncodingFormat::Jpeg => Some(settings.jpeg_quality.clamp(1, 100)),
        EncodingFormat::Png => None,
    };

    tracing::info!(
        "Photo captured: {}x{} {} ({} bytes)",
        image.width(),
        image.height(),
        format.mime(),
        data.len()
    );

    Ok(PhotoArtifact {
        data,
        mime: format.mime().to_string(),
        width: image.width(),
        height: image.height(),
        quality,
    })
}
