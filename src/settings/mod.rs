//! Persistent settings

pub mod file;
pub mod schema;

pub use file::{read_settings, write_settings, SettingsError};
pub use schema::{CaptureSettings, PhotoSettings, RecordingSettings, Settings, UploadSettings};
