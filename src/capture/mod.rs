//! Camera capture
//!
//! Device enumeration, the live capture session and capability negotiation,
//! all written against the platform traits in [`traits`].

pub mod capabilities;
pub mod devices;
#[cfg(feature = "native")]
pub mod native;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod fake;

pub use capabilities::{Capabilities, CapabilityNegotiator, ZoomRange};
pub use devices::{classify, DeviceClass, DeviceList, LabelClassifier};
pub use session::{CaptureConfig, CaptureSession, SwitchStrategy};
pub use traits::{
    Device, DeviceKind, FacingMode, FixedOrientation, MediaConstraints, MediaDevices, MediaStream,
    OrientationSource, PreviewSurface, Resolution, TrackSettings, VideoTrack,
};
