//! Upload collaborator
//!
//! The core never speaks HTTP itself. It builds a multipart request
//! description and hands it to an [`Uploader`] supplied by the host.

use super::download::file_name;
use super::MediaBlob;
use async_trait::async_trait;
use thiserror::Error;

/// Multipart form field carrying the file
pub const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no upload endpoint configured")]
    NoEndpoint,

    #[error("nothing to upload")]
    EmptyBody,

    #[error("upload failed: {0}")]
    Transport(String),
}

/// A single-file multipart POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub endpoint: String,
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub body: Vec<u8>,
}

impl UploadRequest {
    pub fn for_artifact(endpoint: &str, artifact: &dyn MediaBlob) -> Result<Self, UploadError> {
        if endpoint.trim().is_empty() {
            return Err(UploadError::NoEndpoint);
        }
        if artifact.bytes().is_empty() {
            return Err(UploadError::EmptyBody);
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            field: UPLOAD_FIELD.to_string(),
            file_name: file_name(artifact.kind(), artifact.mime(), chrono::Local::now()),
            mime: artifact.mime().to_string(),
            body: artifact.bytes().to_vec(),
        })
    }
}

/// Host-side HTTP client
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Send the request; returns the HTTP status code
    async fn send(&self, request: UploadRequest) -> Result<u16, UploadError>;
}

/// Upload an artifact and log the response status
pub async fn upload_artifact(
    uploader: &dyn Uploader,
    endpoint: &str,
    artifact: &dyn MediaBlob,
) -> Result<u16, UploadError> {
    let request = UploadRequest::for_artifact(endpoint, artifact)?;
    let size = request.body.len();
    let name = request.file_name.clone();

    let status = uploader.send(request).await.map_err(|e| {
        tracing::error!("Upload of {} failed: {}", name, e);
        e
    })?;

    if (200..300).contains(&status) {
        tracing::info!("Uploaded {} ({} bytes): status {}", name, size, status);
    } else {
        tracing::warn!("Upload of {} returned status {}", name, status);
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoArtifact;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingUploader {
        requests: Mutex<Vec<UploadRequest>>,
        status: u16,
    }

    #[async_trait]
    impl Uploader for RecordingUploader {
        async fn send(&self, request: UploadRequest) -> Result<u16, UploadError> {
            self.requests.lock().push(request);
            Ok(self.status)
        }
    }

    fn photo(data: &[u8]) -> PhotoArtifact {
        PhotoArtifact {
            data: data.to_vec(),
            mime: "image/png".to_string(),
            width: 1,
            height: 1,
            quality: None,
        }
    }

    #[tokio::test]
    async fn test_upload_builds_multipart_request() {
        let uploader = RecordingUploader {
            status: 201,
            ..Default::default()
        };
        let status = upload_artifact(&uploader, "https://example.test/upload", &photo(b"png"))
            .await
            .unwrap();
        assert_eq!(status, 201);

        let requests = uploader.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].field, "file");
        assert_eq!(requests[0].mime, "image/png");
        assert!(requests[0].file_name.starts_with("photo-"));
        assert!(requests[0].file_name.ends_with(".png"));
        assert_eq!(requests[0].body, b"png");
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_raised() {
        let uploader = RecordingUploader {
            status: 500,
            ..Default::default()
        };
        let status = upload_artifact(&uploader, "https://example.test/upload", &photo(b"png"))
            .await
            .unwrap();
        assert_eq!(status, 500);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let uploader = RecordingUploader::default();
        assert!(matches!(
            upload_artifact(&uploader, " ", &photo(b"png")).await.unwrap_err(),
            UploadError::NoEndpoint
        ));
        assert!(matches!(
            upload_artifact(&uploader, "https://example.test", &photo(b"")).await.unwrap_err(),
            UploadError::EmptyBody
        ));
        assert!(uploader.requests.lock().is_empty());
    }
}
