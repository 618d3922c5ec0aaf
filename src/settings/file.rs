//! Settings file read/write

use super::schema::Settings;
use crate::utils::error::CameraError;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Settings-related errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

impl From<SettingsError> for CameraError {
    fn from(error: SettingsError) -> Self {
        CameraError::Settings(error.to_string())
    }
}

/// Read settings; a missing file yields the defaults
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate(&settings)?;

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Write settings, creating parent directories as needed
pub fn write_settings(settings: &Settings, path: &Path) -> Result<(), SettingsError> {
    validate(settings)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}

fn validate(settings: &Settings) -> Result<(), SettingsError> {
    if !(1..=100).contains(&settings.photo.jpeg_quality) {
        return Err(SettingsError::Invalid(format!(
            "jpegQuality must be 1-100, got {}",
            settings.photo.jpeg_quality
        )));
    }
    if settings.recording.chunk_interval_ms == 0 {
        return Err(SettingsError::Invalid("chunkIntervalMs must be positive".to_string()));
    }
    if settings.capture.config.zoom < 1.0 {
        return Err(SettingsError::Invalid(format!(
            "zoom must be at least 1.0, got {}",
            settings.capture.config.zoom
        )));
    }
    Ok(())
}
