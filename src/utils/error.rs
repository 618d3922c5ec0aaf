//! Error types and handling
//!
//! Common error types used across the capture core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by platform media APIs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// No device satisfies the requested constraints
    #[error("no device matches the requested constraints: {0}")]
    NotFound(String),

    /// The platform or the user blocked access
    #[error("access to the device was not allowed: {0}")]
    NotAllowed(String),

    /// The device exists but cannot honour an exact constraint
    #[error("constraint cannot be satisfied: {0}")]
    OverConstrained(String),

    /// The requested feature is not available on this platform
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Any other failure reported by the platform
    #[error("{0}")]
    Other(String),
}

/// Errors reported by a chunk store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk store is closed")]
    Closed,

    #[error("invalid chunk entry: {0}")]
    InvalidEntry(String),
}

/// Capture-core error type
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Stream has no usable video track")]
    NoVideoTrack,

    #[error("Zoom is not supported by the active camera")]
    ZoomUnsupported,

    #[error("Torch is not supported by the active camera")]
    TorchUnsupported,

    #[error("No active camera stream")]
    NoActiveStream,

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Recording produced no chunks")]
    EmptyRecording,

    #[error("Recording artifact is empty")]
    EmptyArtifact,

    #[error("Chunk store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Invalid recording state: expected {expected}, found {actual}")]
    InvalidRecordingState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl CameraError {
    /// Whether this error only means "the hardware lacks this control".
    ///
    /// Callers hide the matching control instead of reporting a failure.
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, CameraError::ZoomUnsupported | CameraError::TorchUnsupported)
    }

    /// Stable error code for the UI layer
    pub fn code(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied(_) => "PERMISSION_DENIED",
            CameraError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            CameraError::NoVideoTrack => "NO_VIDEO_TRACK",
            CameraError::ZoomUnsupported => "ZOOM_UNSUPPORTED",
            CameraError::TorchUnsupported => "TORCH_UNSUPPORTED",
            CameraError::NoActiveStream => "NO_ACTIVE_STREAM",
            CameraError::EncodeFailed(_) => "ENCODE_FAILED",
            CameraError::EmptyRecording => "EMPTY_RECORDING",
            CameraError::EmptyArtifact => "EMPTY_ARTIFACT",
            CameraError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            CameraError::AlreadyRecording => "ALREADY_RECORDING",
            CameraError::InvalidRecordingState { .. } => "INVALID_RECORDING_STATE",
            CameraError::Platform(_) => "PLATFORM_ERROR",
            CameraError::Io(_) => "IO_ERROR",
            CameraError::Settings(_) => "SETTINGS_ERROR",
        }
    }

    /// Map a failed stream request onto the acquisition taxonomy
    pub fn from_acquire(error: PlatformError) -> Self {
        match error {
            PlatformError::NotAllowed(msg) => CameraError::PermissionDenied(msg),
            PlatformError::NotFound(msg) | PlatformError::OverConstrained(msg) => {
                CameraError::DeviceUnavailable(msg)
            }
            other => CameraError::Platform(other.to_string()),
        }
    }
}

impl From<PlatformError> for CameraError {
    fn from(error: PlatformError) -> Self {
        CameraError::Platform(error.to_string())
    }
}

/// Error response for the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// True when the error only means a control should be hidden
    pub capability_gap: bool,
}

impl From<CameraError> for ErrorResponse {
    fn from(error: CameraError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            capability_gap: error.is_capability_gap(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;
