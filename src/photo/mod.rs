//! Still photo capture and post-processing

pub mod capture;
pub mod encoding;
pub mod processing;

pub use capture::PhotoPipeline;
pub use encoding::EncodingFormat;
pub use processing::{compress, crop_to_aspect, crop_to_square, resize_to_fit};

use crate::share::{MediaBlob, MediaKind};

/// An encoded still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoArtifact {
    pub data: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// JPEG quality the data was encoded at; `None` for lossless or unknown
    pub quality: Option<u8>,
}

impl MediaBlob for PhotoArtifact {
    fn kind(&self) -> MediaKind {
        MediaKind::Photo
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn mime(&self) -> &str {
        &self.mime
    }
}
