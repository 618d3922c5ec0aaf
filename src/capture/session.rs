//! Capture session
//!
//! Owns the single live camera stream: acquire, reconfigure, release.
//! Acquisition takes `&mut self`, so two requests can never race and leave
//! two streams open.

use super::capabilities::{negotiate, Capabilities, CapabilityNegotiator};
use super::devices::{DeviceList, LabelClassifier};
use super::traits::{
    FacingMode, MediaConstraints, MediaDevices, MediaStream, Resolution, TrackSettings,
    VideoConstraints, VideoTrack,
};
use crate::utils::error::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Requested camera configuration
///
/// After every successful acquire this reflects what the hardware actually
/// granted rather than what was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Exact device to open; `None` lets the facing mode decide
    pub device_id: Option<String>,

    /// Ideal resolution
    pub resolution: Resolution,

    /// Preferred facing mode
    pub facing_mode: FacingMode,

    /// Zoom level (1.0 = none)
    pub zoom: f64,

    /// Torch state
    pub torch_enabled: bool,

    /// Also open the microphone
    pub audio: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            resolution: Resolution::FULL_HD,
            facing_mode: FacingMode::Environment,
            zoom: 1.0,
            torch_enabled: false,
            audio: false,
        }
    }
}

impl CaptureConfig {
    /// Stream request for this config
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            video: VideoConstraints {
                device_id: self.device_id.clone(),
                facing_mode: if self.device_id.is_some() {
                    None
                } else {
                    Some(self.facing_mode)
                },
                ideal_resolution: self.resolution,
            },
            audio: self.audio,
        }
    }
}

/// How `switch_camera` picks the next camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchStrategy {
    /// Toggle between user and environment facing (phones)
    #[default]
    FacingMode,
    /// Cycle through enumerated cameras by device ID (desktops, external cameras)
    RoundRobin,
}

struct ActiveStream {
    stream: Arc<dyn MediaStream>,
    video_track: Arc<dyn VideoTrack>,
    capabilities: Capabilities,
    settings: TrackSettings,
}

/// The one live camera stream and its negotiated state
pub struct CaptureSession {
    devices: Arc<dyn MediaDevices>,
    config: CaptureConfig,
    strategy: SwitchStrategy,
    classifier: LabelClassifier,
    active: Option<ActiveStream>,
    suspended: bool,
}

impl CaptureSession {
    /// Create an idle session; nothing is opened until [`acquire`](Self::acquire)
    pub fn new(devices: Arc<dyn MediaDevices>, config: CaptureConfig, strategy: SwitchStrategy) -> Self {
        Self {
            devices,
            config,
            strategy,
            classifier: LabelClassifier::default(),
            active: None,
            suspended: false,
        }
    }

    /// Replace the label classifier used when switching cameras
    pub fn with_classifier(mut self, classifier: LabelClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn strategy(&self) -> SwitchStrategy {
        self.strategy
    }

    pub fn devices(&self) -> &Arc<dyn MediaDevices> {
        &self.devices
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.active.as_ref().map(|a| a.stream.clone())
    }

    pub fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.active.as_ref().map(|a| a.video_track.clone())
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.active.as_ref().map(|a| a.capabilities)
    }

    pub fn settings(&self) -> Option<&TrackSettings> {
        self.active.as_ref().map(|a| &a.settings)
    }

    /// Facing mode of the live camera, falling back to the configured one
    pub fn facing_mode(&self) -> FacingMode {
        self.settings()
            .and_then(|s| s.facing_mode)
            .unwrap_or(self.config.facing_mode)
    }

    /// Open a stream for `config`, replacing any current stream.
    ///
    /// The previous stream is stopped before the new request goes out. The
    /// session config is only updated when the request succeeds.
    pub async fn acquire(&mut self, config: CaptureConfig) -> CameraResult<TrackSettings> {
        self.release();

        let constraints = config.constraints();
        tracing::info!(
            "Requesting camera stream (device={:?}, facing={:?}, ideal={})",
            constraints.video.device_id,
            constraints.video.facing_mode,
            constraints.video.ideal_resolution
        );

        let stream = self
            .devices
            .get_user_media(&constraints)
            .await
            .map_err(|e| {
                tracing::error!("Camera request failed: {}", e);
                CameraError::from_acquire(e)
            })?;

        let Some(video_track) = stream.video_tracks().into_iter().next() else {
            tracing::error!("Stream {} has no video track", stream.id());
            stream.stop_all();
            return Err(CameraError::NoVideoTrack);
        };

        let settings = video_track.settings();
        let capabilities = negotiate(video_track.as_ref());

        let mut config = config;
        if let Some(device_id) = &settings.device_id {
            config.device_id = Some(device_id.clone());
        }
        if settings.width > 0 && settings.height > 0 {
            config.resolution = settings.resolution();
        }
        if let Some(facing) = settings.facing_mode {
            config.facing_mode = facing;
        }

        tracing::info!(
            "Camera stream {} active: {} (device={:?}, facing={:?})",
            stream.id(),
            config.resolution,
            config.device_id,
            settings.facing_mode
        );

        self.config = config;
        self.active = Some(ActiveStream {
            stream,
            video_track,
            capabilities,
            settings: settings.clone(),
        });
        self.suspended = false;

        self.restore_controls().await;
        Ok(settings)
    }

    /// Reapply the remembered zoom/torch where the new track supports them.
    ///
    /// Anything the track refuses is reset in the config, so the config never
    /// claims a zoom or torch state the hardware does not have.
    async fn restore_controls(&mut self) {
        let zoom = self.config.zoom;
        let torch = self.config.torch_enabled;
        let Ok(mut negotiator) = self.negotiator() else {
            return;
        };
        let capabilities = negotiator.capabilities();

        let zoom_restored = match capabilities.zoom {
            Some(_) if zoom > 1.0 => match negotiator.set_zoom(zoom).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Could not restore zoom {}: {}", zoom, e);
                    false
                }
            },
            _ => false,
        };
        if !zoom_restored {
            self.config.zoom = 1.0;
        }

        let Ok(mut negotiator) = self.negotiator() else {
            return;
        };
        let torch_restored = capabilities.torch
            && torch
            && match negotiator.set_torch(true).await {
                Ok(applied) => applied,
                Err(e) => {
                    tracing::warn!("Could not restore torch: {}", e);
                    false
                }
            };
        if torch && !torch_restored {
            tracing::info!("Torch not restored on stream, marking it off");
        }
        self.config.torch_enabled = torch_restored;
    }

    /// Stop every track and forget the stream. No-op when idle.
    pub fn release(&mut self) {
        if let Some(active) = self.active.take() {
            active.stream.stop_all();
            tracing::info!("Released camera stream {}", active.stream.id());
        }
    }

    /// Move to the next logical camera.
    ///
    /// Zoom and torch are reset since the new optics may not support the
    /// same values.
    pub async fn switch_camera(&mut self) -> CameraResult<()> {
        let mut next = self.config.clone();

        match self.strategy {
            SwitchStrategy::FacingMode => {
                next.facing_mode = self.facing_mode().toggled();
                next.device_id = None;
            }
            SwitchStrategy::RoundRobin => {
                let list = DeviceList::load(self.devices.as_ref()).await?;
                if list.cameras.len() < 2 {
                    tracing::info!("Only {} camera(s) available, not switching", list.cameras.len());
                    return Ok(());
                }
                let current = self
                    .settings()
                    .and_then(|s| s.device_id.clone())
                    .or_else(|| self.config.device_id.clone());
                let camera = list
                    .next_camera(current.as_deref())
                    .cloned()
                    .ok_or_else(|| CameraError::DeviceUnavailable("no camera to switch to".to_string()))?;
                next.facing_mode = self.classifier.classify(&camera).facing_mode();
                next.device_id = Some(camera.id);
            }
        }

        next.zoom = 1.0;
        next.torch_enabled = false;

        tracing::info!("Switching camera ({:?})", self.strategy);
        self.acquire(next).await?;
        self.config.zoom = 1.0;
        self.config.torch_enabled = false;
        Ok(())
    }

    /// Host page hidden: give the camera back to the OS
    pub fn suspend(&mut self) {
        if self.active.is_some() {
            self.release();
            self.suspended = true;
            tracing::info!("Camera suspended");
        }
    }

    /// Host page visible again: reopen with the last known config.
    ///
    /// Returns `Ok(false)` when nothing was suspended. If the device vanished
    /// meanwhile the error is returned and the session stays suspended.
    pub async fn resume(&mut self) -> CameraResult<bool> {
        if !self.suspended {
            return Ok(false);
        }
        let config = self.config.clone();
        self.acquire(config).await?;
        tracing::info!("Camera resumed");
        Ok(true)
    }

    /// Control surface for the live track
    pub fn negotiator(&mut self) -> CameraResult<CapabilityNegotiator<'_>> {
        let active = self.active.as_ref().ok_or(CameraError::NoActiveStream)?;
        Ok(CapabilityNegotiator::new(
            active.video_track.as_ref(),
            active.capabilities,
            &mut self.config,
        ))
    }

    pub async fn set_zoom(&mut self, value: f64) -> CameraResult<f64> {
        self.negotiator()?.set_zoom(value).await
    }

    pub async fn set_torch(&mut self, enabled: bool) -> CameraResult<bool> {
        self.negotiator()?.set_torch(enabled).await
    }

    pub async fn toggle_torch(&mut self) -> CameraResult<bool> {
        self.negotiator()?.toggle_torch().await
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
