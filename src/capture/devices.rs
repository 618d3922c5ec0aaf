//! Device enumeration and classification
//!
//! Classification is a best-effort label heuristic: platforms do not promise
//! anything about labels, so callers can supply their own keyword lists.

use super::traits::{Device, DeviceKind, FacingMode, MediaDevices};
use crate::utils::error::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};

/// Physical placement of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Front,
    Back,
    External,
}

impl DeviceClass {
    /// Facing mode to request for a camera of this class
    pub fn facing_mode(self) -> FacingMode {
        match self {
            DeviceClass::Front => FacingMode::User,
            DeviceClass::Back | DeviceClass::External => FacingMode::Environment,
        }
    }
}

/// Keyword based label classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelClassifier {
    /// Lowercase substrings identifying a front camera
    pub front_keywords: Vec<String>,

    /// Lowercase substrings identifying a back camera
    pub back_keywords: Vec<String>,
}

impl Default for LabelClassifier {
    fn default() -> Self {
        Self {
            front_keywords: ["front", "user", "facetime", "selfie", "frontal"]
                .into_iter()
                .map(String::from)
                .collect(),
            back_keywords: ["back", "rear", "environment", "traseira"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LabelClassifier {
    /// Classify a device by its label.
    ///
    /// Front keywords win over back keywords; anything unmatched is external.
    pub fn classify(&self, device: &Device) -> DeviceClass {
        let label = device.label.to_lowercase();
        if self.front_keywords.iter().any(|k| label.contains(k.as_str())) {
            DeviceClass::Front
        } else if self.back_keywords.iter().any(|k| label.contains(k.as_str())) {
            DeviceClass::Back
        } else {
            DeviceClass::External
        }
    }
}

/// Classify with the default keyword lists
pub fn classify(device: &Device) -> DeviceClass {
    LabelClassifier::default().classify(device)
}

/// Devices split by kind, in platform order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    pub cameras: Vec<Device>,
    pub microphones: Vec<Device>,
}

impl DeviceList {
    /// Enumerate devices from the platform
    pub async fn load(devices: &dyn MediaDevices) -> CameraResult<Self> {
        let all = devices
            .enumerate_devices()
            .await
            .map_err(|e| CameraError::Platform(format!("device enumeration failed: {e}")))?;

        let list = Self::from_devices(all);
        tracing::debug!(
            "Enumerated {} camera(s), {} microphone(s)",
            list.cameras.len(),
            list.microphones.len()
        );
        Ok(list)
    }

    pub fn from_devices(devices: Vec<Device>) -> Self {
        let (cameras, microphones) = devices
            .into_iter()
            .partition(|d| d.kind == DeviceKind::Video);
        Self {
            cameras,
            microphones,
        }
    }

    /// Camera following `current` in platform order, wrapping around.
    ///
    /// An unknown or absent `current` starts from the first camera.
    pub fn next_camera(&self, current: Option<&str>) -> Option<&Device> {
        if self.cameras.is_empty() {
            return None;
        }
        let next = match current.and_then(|id| self.cameras.iter().position(|c| c.id == id)) {
            Some(index) => (index + 1) % self.cameras.len(),
            None => 0,
        };
        self.cameras.get(next)
    }
}
