//! Capability negotiation
//!
//! Discovers which optional controls (zoom, torch) the active track exposes
//! and applies user intent to the track. Capabilities belong to the physical
//! device currently streaming, so they are renegotiated on every acquire.

use super::session::CaptureConfig;
use super::traits::{TrackConstraint, VideoTrack};
use crate::utils::error::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};

/// Slider step used when the platform reports none
pub const DEFAULT_ZOOM_STEP: f64 = 0.1;

/// Negotiated zoom range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ZoomRange {
    /// Clamp a requested zoom into the range (NaN maps to `min`)
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Controls the active track supports
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Zoom range; `None` means the zoom control must be hidden
    pub zoom: Option<ZoomRange>,

    /// Whether a torch can be switched on
    pub torch: bool,
}

/// Read the capability descriptor of a track
pub fn negotiate(track: &dyn VideoTrack) -> Capabilities {
    let Some(descriptor) = track.capabilities() else {
        tracing::debug!("Track {} does not report capabilities", track.id());
        return Capabilities::default();
    };

    let zoom = descriptor.zoom.and_then(|range| {
        if !range.min.is_finite() || !range.max.is_finite() || range.max < range.min {
            tracing::warn!(
                "Ignoring degenerate zoom range {}..{} on track {}",
                range.min,
                range.max,
                track.id()
            );
            return None;
        }
        let step = range
            .step
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_ZOOM_STEP);
        Some(ZoomRange {
            min: range.min,
            max: range.max,
            step,
        })
    });

    let capabilities = Capabilities {
        zoom,
        torch: descriptor.torch.unwrap_or(false),
    };
    tracing::info!("Negotiated capabilities: {:?}", capabilities);
    capabilities
}

/// Zoom label relative to the range minimum, e.g. `x2.0`
pub fn zoom_label(range: &ZoomRange, value: f64) -> String {
    let normalized = if range.min > 0.0 {
        value / range.min
    } else {
        value
    };
    format!("x{normalized:.1}")
}

/// Applies control changes to the active track.
///
/// Borrowed from the [`CaptureSession`](super::session::CaptureSession) so the
/// config always reflects what was actually applied.
pub struct CapabilityNegotiator<'a> {
    track: &'a dyn VideoTrack,
    capabilities: Capabilities,
    config: &'a mut CaptureConfig,
}

impl<'a> CapabilityNegotiator<'a> {
    pub(crate) fn new(
        track: &'a dyn VideoTrack,
        capabilities: Capabilities,
        config: &'a mut CaptureConfig,
    ) -> Self {
        Self {
            track,
            capabilities,
            config,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Set the zoom level.
    ///
    /// Returns the value actually applied, which may differ from `value`
    /// after clamping.
    pub async fn set_zoom(&mut self, value: f64) -> CameraResult<f64> {
        let range = self.capabilities.zoom.ok_or(CameraError::ZoomUnsupported)?;
        let clamped = range.clamp(value);
        if clamped != value {
            tracing::debug!("Zoom {} clamped to {}", value, clamped);
        }

        self.track
            .apply_constraint(TrackConstraint::Zoom(clamped))
            .await
            .map_err(|e| CameraError::Platform(format!("failed to apply zoom: {e}")))?;

        self.config.zoom = clamped;
        Ok(clamped)
    }

    /// Switch the torch on or off.
    ///
    /// Platform failures (thermal limits and the like) are common and come
    /// back as `Ok(false)`.
    pub async fn set_torch(&mut self, enabled: bool) -> CameraResult<bool> {
        if !self.capabilities.torch {
            return Err(CameraError::TorchUnsupported);
        }

        match self.track.apply_constraint(TrackConstraint::Torch(enabled)).await {
            Ok(()) => {
                self.config.torch_enabled = enabled;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Failed to set torch to {}: {}", enabled, e);
                Ok(false)
            }
        }
    }

    /// Flip the torch state; returns the new state on success
    pub async fn toggle_torch(&mut self) -> CameraResult<bool> {
        let target = !self.config.torch_enabled;
        self.set_torch(target).await?;
        Ok(self.config.torch_enabled)
    }
}
