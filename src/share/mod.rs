//! Handing captured media to the outside world

pub mod download;
pub mod upload;

pub use download::{file_name, prepare_download, revoke, Download};
pub use upload::{upload_artifact, UploadError, UploadRequest, Uploader};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "recording",
        }
    }
}

/// An encoded capture ready to be saved or sent
pub trait MediaBlob: Send + Sync {
    fn kind(&self) -> MediaKind;

    fn bytes(&self) -> &[u8];

    fn mime(&self) -> &str;
}
