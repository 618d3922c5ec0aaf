//! Recording container selection

use super::channel::MediaEncoder;

/// Preferred recording formats, best first
pub const DEFAULT_MIME_PREFERENCES: [&str; 4] = [
    "video/mp4;codecs=avc1",
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
];

pub fn default_preferences() -> Vec<String> {
    DEFAULT_MIME_PREFERENCES.iter().map(|m| m.to_string()).collect()
}

/// First preferred MIME type the encoder supports.
///
/// `None` means no preference is supported and the encoder should pick.
pub fn select_mime(encoder: &dyn MediaEncoder, preferences: &[String]) -> Option<String> {
    let selected = preferences
        .iter()
        .find(|mime| encoder.is_type_supported(mime))
        .cloned();

    match &selected {
        Some(mime) => tracing::debug!("Selected recording format {}", mime),
        None => tracing::warn!(
            "None of {:?} supported, using encoder default {}",
            preferences,
            encoder.default_mime()
        ),
    }
    selected
}
