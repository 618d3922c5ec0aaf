//! Saving artifacts for the user
//!
//! Writes an artifact to a directory under a date-derived name and returns a
//! `file://` URL the host can hand to the browser or OS.

use super::{MediaBlob, MediaKind};
use crate::utils::error::{CameraError, CameraResult};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// A saved artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub path: PathBuf,
    pub url: String,
}

/// File extension for a MIME type, ignoring codec parameters
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        _ => "bin",
    }
}

/// Date/time derived file name, e.g. `photo-20240131_154501.jpg`
pub fn file_name<Tz>(kind: MediaKind, mime: &str, at: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}-{}.{}",
        kind.prefix(),
        at.format("%Y%m%d_%H%M%S"),
        extension_for_mime(mime)
    )
}

fn file_url(path: &Path) -> String {
    let encoded: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => {
                Some(urlencoding::encode(&part.to_string_lossy()).into_owned())
            }
            _ => None,
        })
        .collect();
    format!("file:///{}", encoded.join("/"))
}

/// Write `artifact` into `dir` and describe where it went
pub async fn prepare_download(artifact: &dyn MediaBlob, dir: &Path) -> CameraResult<Download> {
    if artifact.bytes().is_empty() {
        return Err(CameraError::EmptyArtifact);
    }

    tokio::fs::create_dir_all(dir).await?;

    let file_name = file_name(artifact.kind(), artifact.mime(), chrono::Local::now());
    let mut path = dir.join(&file_name);
    // Two captures within the same second
    let mut n = 1;
    while tokio::fs::try_exists(&path).await? {
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, ext)| format!("{stem}-{n}.{ext}"))
            .unwrap_or_else(|| format!("{file_name}-{n}"));
        path = dir.join(stem);
        n += 1;
    }

    tokio::fs::write(&path, artifact.bytes()).await?;
    let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);
    let url = file_url(&path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(file_name);

    tracing::info!("Saved {} bytes to {:?}", artifact.bytes().len(), path);
    Ok(Download { file_name, path, url })
}

/// Remove a prepared download; already gone is fine
pub async fn revoke(download: &Download) -> CameraResult<()> {
    match tokio::fs::remove_file(&download.path).await {
        Ok(()) => {
            tracing::debug!("Revoked {}", download.url);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoArtifact;
    use chrono::Utc;
    use tempfile::tempdir;

    fn photo(data: &[u8]) -> PhotoArtifact {
        PhotoArtifact {
            data: data.to_vec(),
            mime: "image/jpeg".to_string(),
            width: 1,
            height: 1,
            quality: Some(92),
        }
    }

    #[test]
    fn test_file_name_from_kind_mime_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 15, 45, 1).unwrap();
        assert_eq!(file_name(MediaKind::Photo, "image/jpeg", at), "photo-20240131_154501.jpg");
        assert_eq!(file_name(MediaKind::Photo, "image/png", at), "photo-20240131_154501.png");
        assert_eq!(
            file_name(MediaKind::Video, "video/webm;codecs=vp9", at),
            "recording-20240131_154501.webm"
        );
        assert_eq!(
            file_name(MediaKind::Video, "video/mp4;codecs=avc1", at),
            "recording-20240131_154501.mp4"
        );
    }

    #[test]
    fn test_url_is_percent_encoded() {
        let url = file_url(Path::new("/tmp/my photos/photo 1.jpg"));
        assert_eq!(url, "file:///tmp/my%20photos/photo%201.jpg");
    }

    #[tokio::test]
    async fn test_prepare_and_revoke() {
        let dir = tempdir().unwrap();
        let download = prepare_download(&photo(b"jpeg-bytes"), dir.path()).await.unwrap();

        assert!(download.file_name.starts_with("photo-"));
        assert!(download.url.starts_with("file:///"));
        assert_eq!(std::fs::read(&download.path).unwrap(), b"jpeg-bytes");

        let second = prepare_download(&photo(b"other"), dir.path()).await.unwrap();
        assert_ne!(second.path, download.path);

        revoke(&download).await.unwrap();
        assert!(!download.path.exists());
        revoke(&download).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_artifact_is_not_saved() {
        let dir = tempdir().unwrap();
        let err = prepare_download(&photo(b""), dir.path()).await.unwrap_err();
        assert!(matches!(err, CameraError::EmptyArtifact));
    }
}
