//! Settings schema definitions
//!
//! One JSON document with a section per subsystem. Every field has a
//! default, so partial documents load.

use crate::capture::{CaptureConfig, SwitchStrategy};
use crate::photo::EncodingFormat;
use crate::recorder::mime::default_preferences;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Root
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub capture: CaptureSettings,
    pub photo: PhotoSettings,
    pub recording: RecordingSettings,
    pub upload: UploadSettings,
}

// =============================================================================
// Capture
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Configuration used for the first acquire
    pub config: CaptureConfig,
    pub switch_strategy: SwitchStrategy,
}

// =============================================================================
// Photo
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoSettings {
    /// Try a full-resolution frame grab before snapshotting the preview
    pub enhanced_grab: bool,
    /// Mirror user-facing captures to match the preview
    pub mirror_user_facing: bool,
    /// Rotate captures using the orientation sensor
    pub auto_rotate: bool,
    pub format: EncodingFormat,
    /// 1-100
    pub jpeg_quality: u8,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            enhanced_grab: true,
            mirror_user_facing: true,
            auto_rotate: true,
            format: EncodingFormat::Jpeg,
            jpeg_quality: 92,
        }
    }
}

// =============================================================================
// Recording
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingSettings {
    pub chunk_interval_ms: u64,
    /// Chunks kept in memory when the store is unavailable
    pub memory_chunk_limit: usize,
    /// Recording formats, best first
    pub mime_preferences: Vec<String>,
    pub memory_fallback: bool,
    /// Durable chunk directory; `None` keeps chunks in an in-process store
    pub chunk_store_dir: Option<PathBuf>,
}

impl RecordingSettings {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 1000,
            memory_chunk_limit: 5,
            mime_preferences: default_preferences(),
            memory_fallback: true,
            chunk_store_dir: None,
        }
    }
}

// =============================================================================
// Upload
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadSettings {
    /// Multipart endpoint; uploads are disabled without one
    pub endpoint: Option<String>,
    /// Send every capture as soon as it is taken
    pub auto_upload: bool,
}
