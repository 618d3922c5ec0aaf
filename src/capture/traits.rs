//! Capture trait definitions
//!
//! Platform-agnostic types and traits for camera sources. A host (browser
//! bridge, native backend, test double) implements these; the session and
//! pipelines only ever talk to the traits.

use crate::utils::error::PlatformError;
use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Standard 720p resolution.
    pub const HD: Self = Self {
        width: 1280,
        height: 720,
    };

    /// Standard 1080p resolution.
    pub const FULL_HD: Self = Self {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of media input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Video,
    Audio,
}

/// Information about an input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Platform device ID
    pub id: String,

    /// Video or audio input
    pub kind: DeviceKind,

    /// Human readable label (may be empty before permission is granted)
    pub label: String,
}

impl Device {
    pub fn video(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DeviceKind::Video,
            label: label.into(),
        }
    }

    pub fn audio(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DeviceKind::Audio,
            label: label.into(),
        }
    }
}

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front / selfie camera
    User,
    /// Back camera
    #[default]
    Environment,
}

impl FacingMode {
    /// The opposite facing mode
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

/// Video part of a stream request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Exact device ID; takes precedence over `facing_mode`
    pub device_id: Option<String>,

    /// Preferred facing mode (ideal, not exact)
    pub facing_mode: Option<FacingMode>,

    /// Ideal resolution; the platform may grant something else
    pub ideal_resolution: Resolution,
}

/// A stream request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

/// Settings actually in effect on a video track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub device_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub facing_mode: Option<FacingMode>,
}

impl TrackSettings {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Numeric range as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub min: f64,
    pub max: f64,
    pub step: Option<f64>,
}

/// Raw capability descriptor of a track
///
/// Fields are `None` when the platform does not report them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub zoom: Option<RangeDescriptor>,
    pub torch: Option<bool>,
}

/// A single advanced constraint applied to a live track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackConstraint {
    Zoom(f64),
    Torch(bool),
}

/// Stream acquisition and device enumeration
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// List every input device the platform exposes
    async fn enumerate_devices(&self) -> Result<Vec<Device>, PlatformError>;

    /// Request a live stream matching `constraints`
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Arc<dyn MediaStream>, PlatformError>;
}

/// A live stream owning one or more tracks
pub trait MediaStream: Send + Sync {
    /// Stream identifier
    fn id(&self) -> &str;

    /// Video tracks of this stream, first one is the primary
    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>>;

    /// Whether an audio track is attached
    fn has_audio(&self) -> bool;

    /// Stop every track, releasing the hardware
    fn stop_all(&self);

    /// Number of tracks that are still live
    fn live_tracks(&self) -> usize;
}

/// A live video track
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Track identifier
    fn id(&self) -> &str;

    /// Settings actually granted by the platform
    fn settings(&self) -> TrackSettings;

    /// Capability descriptor, `None` when the platform cannot introspect
    fn capabilities(&self) -> Option<CapabilityDescriptor>;

    /// Apply an advanced constraint
    async fn apply_constraint(&self, constraint: TrackConstraint) -> Result<(), PlatformError>;

    /// Grab a full quality frame straight from the track
    ///
    /// Not every platform has this; the default reports it as unsupported.
    async fn grab_frame(&self) -> Result<RgbaImage, PlatformError> {
        Err(PlatformError::NotSupported("frame grab".to_string()))
    }

    /// Whether the track is still delivering frames
    fn is_live(&self) -> bool;
}

/// The element rendering the live preview
pub trait PreviewSurface: Send + Sync {
    /// Current preview frame, unmirrored, or `None` if nothing is showing
    fn snapshot(&self) -> Option<RgbaImage>;
}

/// Device orientation sensor
pub trait OrientationSource: Send + Sync {
    /// Screen rotation angle in degrees (0, 90, 180 or 270)
    fn angle(&self) -> u16;
}

/// Orientation source for hosts without a sensor
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrientation(pub u16);

impl OrientationSource for FixedOrientation {
    fn angle(&self) -> u16 {
        self.0
    }
}
