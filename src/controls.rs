//! UI control surface
//!
//! Maps each camera control (shutter, switch, flash, zoom, record, pause,
//! resume, stop) and page visibility changes onto the capture core. The
//! session and recorder sit behind async mutexes that are always taken in
//! that order.

use crate::capture::capabilities::zoom_label;
use crate::capture::{
    Capabilities, CaptureSession, MediaDevices, OrientationSource, PreviewSurface, TrackSettings,
};
use crate::photo::{PhotoArtifact, PhotoPipeline};
use crate::recorder::{
    spawn_ticker, ChunkStore, FsChunkStore, MediaEncoder, MemoryChunkStore, RecordingEvent,
    RecordingState, VideoArtifact, VideoRecorder,
};
use crate::settings::{Settings, UploadSettings};
use crate::share::{upload_artifact, MediaBlob, UploadError, Uploader};
use crate::utils::error::{CameraError, CameraResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

impl From<UploadError> for CameraError {
    fn from(error: UploadError) -> Self {
        CameraError::Platform(error.to_string())
    }
}

/// Zoom value with its display label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomLevel {
    pub value: f64,
    pub label: String,
}

/// Host-facing camera controls
pub struct CameraControls {
    session: Arc<Mutex<CaptureSession>>,
    recorder: Arc<Mutex<VideoRecorder>>,
    photos: PhotoPipeline,
    preview: Arc<dyn PreviewSurface>,
    orientation: Arc<dyn OrientationSource>,
    uploader: Option<Arc<dyn Uploader>>,
    upload: UploadSettings,
    chunk_interval: Duration,
    ticker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl CameraControls {
    /// Wire the core together from settings.
    ///
    /// Without a chunk directory chunks go to an in-process store. A directory
    /// that cannot be opened is logged and recording falls back to the
    /// bounded memory ring.
    pub async fn new(
        devices: Arc<dyn MediaDevices>,
        encoder: Arc<dyn MediaEncoder>,
        preview: Arc<dyn PreviewSurface>,
        orientation: Arc<dyn OrientationSource>,
        settings: Settings,
    ) -> Self {
        let store: Option<Arc<dyn ChunkStore>> = match &settings.recording.chunk_store_dir {
            Some(dir) => match FsChunkStore::open(dir).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!("{}, recording to memory only", CameraError::from(e));
                    None
                }
            },
            None => Some(Arc::new(MemoryChunkStore::new())),
        };

        let session = CaptureSession::new(
            devices,
            settings.capture.config.clone(),
            settings.capture.switch_strategy,
        );
        let chunk_interval = settings.recording.chunk_interval();
        let recorder = VideoRecorder::new(encoder, store, settings.recording);

        Self {
            session: Arc::new(Mutex::new(session)),
            recorder: Arc::new(Mutex::new(recorder)),
            photos: PhotoPipeline::new(settings.photo),
            preview,
            orientation,
            uploader: None,
            upload: settings.upload,
            chunk_interval,
            ticker: parking_lot::Mutex::new(None),
        }
    }

    /// Host HTTP client for uploads
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn session(&self) -> Arc<Mutex<CaptureSession>> {
        self.session.clone()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.lock().await.subscribe()
    }

    /// Open the camera with the last known configuration.
    /// Not allowed while recording.
    pub async fn start_camera(&self) -> CameraResult<TrackSettings> {
        let mut session = self.session.lock().await;
        self.ensure_idle().await?;
        let config = session.config().clone();
        session.acquire(config).await
    }

    /// Which controls to show
    pub async fn capabilities(&self) -> Option<Capabilities> {
        self.session.lock().await.capabilities()
    }

    /// Take a photo
    pub async fn shutter(&self) -> CameraResult<PhotoArtifact> {
        let photo = {
            let session = self.session.lock().await;
            self.photos
                .capture(&session, self.preview.as_ref(), self.orientation.as_ref())
                .await?
        };
        self.auto_upload(&photo).await;
        Ok(photo)
    }

    /// Switch to the next camera. Not allowed while recording.
    pub async fn switch_camera(&self) -> CameraResult<()> {
        let mut session = self.session.lock().await;
        self.ensure_idle().await?;
        session.switch_camera().await
    }

    /// The encoder is bound to the current stream, so nothing may replace
    /// it mid-recording. Callers hold the session lock.
    async fn ensure_idle(&self) -> CameraResult<()> {
        let state = self.recorder.lock().await.state();
        if state != RecordingState::Idle {
            return Err(CameraError::InvalidRecordingState {
                expected: RecordingState::Idle.as_str(),
                actual: state.as_str(),
            });
        }
        Ok(())
    }

    /// Flash button; returns the new torch state
    pub async fn toggle_flash(&self) -> CameraResult<bool> {
        self.session.lock().await.toggle_torch().await
    }

    /// Zoom slider
    pub async fn set_zoom(&self, value: f64) -> CameraResult<ZoomLevel> {
        let mut session = self.session.lock().await;
        let value = session.set_zoom(value).await?;
        let range = session
            .capabilities()
            .and_then(|c| c.zoom)
            .ok_or(CameraError::ZoomUnsupported)?;
        Ok(ZoomLevel {
            value,
            label: zoom_label(&range, value),
        })
    }

    pub async fn start_recording(&self) -> CameraResult<()> {
        let session = self.session.lock().await;
        let mut recorder = self.recorder.lock().await;
        recorder.start(&session).await?;
        drop(recorder);

        let ticker = spawn_ticker(self.recorder.clone(), self.chunk_interval);
        if let Some(previous) = self.ticker.lock().replace(ticker) {
            previous.abort();
        }
        Ok(())
    }

    pub async fn pause_recording(&self) -> CameraResult<()> {
        self.recorder.lock().await.pause().await
    }

    pub async fn resume_recording(&self) -> CameraResult<()> {
        self.recorder.lock().await.resume().await
    }

    pub async fn stop_recording(&self) -> CameraResult<VideoArtifact> {
        let video = {
            let mut recorder = self.recorder.lock().await;
            let result = recorder.stop().await;
            if let Some(ticker) = self.ticker.lock().take() {
                ticker.abort();
            }
            result?
        };
        self.auto_upload(&video).await;
        Ok(video)
    }

    pub async fn recording_state(&self) -> RecordingState {
        self.recorder.lock().await.state()
    }

    pub async fn elapsed(&self) -> Duration {
        self.recorder.lock().await.elapsed()
    }

    /// Page visibility changed.
    ///
    /// Hiding stops any recording (returning what was captured) and gives
    /// the camera back; showing reopens it.
    pub async fn visibility_changed(&self, visible: bool) -> CameraResult<Option<VideoArtifact>> {
        let mut session = self.session.lock().await;

        if visible {
            if session.is_suspended() {
                self.ensure_idle().await?;
            }
            session.resume().await?;
            return Ok(None);
        }

        let video = {
            let mut recorder = self.recorder.lock().await;
            if recorder.state() == RecordingState::Idle {
                None
            } else {
                tracing::info!("Page hidden while recording, stopping");
                let result = recorder.stop().await;
                if let Some(ticker) = self.ticker.lock().take() {
                    ticker.abort();
                }
                match result {
                    Ok(video) => Some(video),
                    Err(e) => {
                        tracing::warn!("Recording stopped on hide produced nothing: {}", e);
                        None
                    }
                }
            }
        };
        session.suspend();
        Ok(video)
    }

    /// Upload an artifact to the configured endpoint
    pub async fn upload(&self, artifact: &dyn MediaBlob) -> CameraResult<u16> {
        let uploader = self.uploader.as_ref().ok_or(UploadError::NoEndpoint)?;
        let endpoint = self.upload.endpoint.as_deref().ok_or(UploadError::NoEndpoint)?;
        Ok(upload_artifact(uploader.as_ref(), endpoint, artifact).await?)
    }

    async fn auto_upload(&self, artifact: &dyn MediaBlob) {
        if !self.upload.auto_upload {
            return;
        }
        if let Err(e) = self.upload(artifact).await {
            tracing::warn!("Automatic upload failed: {}", e);
        }
    }

    /// Stop everything and release the camera
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        let mut recorder = self.recorder.lock().await;
        if recorder.state() != RecordingState::Idle {
            if let Err(e) = recorder.stop().await {
                tracing::debug!("Discarding recording on close: {}", e);
            }
        }
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }
        session.release();
        tracing::info!("Camera controls closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::{split_frame, FakeDevices, FakeEncoder, FakePreview};
    use crate::capture::FixedOrientation;
    use crate::recorder::ArtifactSource;
    use crate::share::UploadRequest;
    use async_trait::async_trait;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingUploader {
        requests: parking_lot::Mutex<Vec<UploadRequest>>,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn send(&self, request: UploadRequest) -> Result<u16, UploadError> {
            self.requests.lock().push(request);
            Ok(200)
        }
    }

    async fn controls(devices: Arc<FakeDevices>, settings: Settings) -> CameraControls {
        CameraControls::new(
            devices,
            Arc::new(FakeEncoder::supporting(&["video/webm"])),
            Arc::new(FakePreview::showing(split_frame(8, 6))),
            Arc::new(FixedOrientation(0)),
            settings,
        )
        .await
    }

    #[tokio::test]
    async fn test_shutter_requires_camera() {
        let controls = controls(Arc::new(FakeDevices::phone()), Settings::default()).await;
        assert!(matches!(controls.shutter().await.unwrap_err(), CameraError::NoActiveStream));

        controls.start_camera().await.unwrap();
        let photo = controls.shutter().await.unwrap();
        assert_eq!(photo.mime, "image/jpeg");
    }

    #[tokio::test]
    async fn test_auto_upload_after_capture() {
        let mut settings = Settings::default();
        settings.upload.endpoint = Some("https://example.test/upload".to_string());
        settings.upload.auto_upload = true;
        let uploader = Arc::new(CountingUploader::default());
        let controls = controls(Arc::new(FakeDevices::phone()), settings)
            .await
            .with_uploader(uploader.clone());

        controls.start_camera().await.unwrap();
        controls.shutter().await.unwrap();
        assert_eq!(uploader.requests.lock().len(), 1);
        assert_eq!(uploader.requests.lock()[0].field, "file");
    }

    #[tokio::test]
    async fn test_zoom_and_flash_follow_capabilities() {
        let controls = controls(Arc::new(FakeDevices::phone()), Settings::default()).await;
        controls.start_camera().await.unwrap();

        let zoom = controls.set_zoom(2.0).await.unwrap();
        assert_eq!(zoom, ZoomLevel { value: 2.0, label: "x2.0".to_string() });
        assert!(controls.toggle_flash().await.unwrap());

        controls.switch_camera().await.unwrap();
        let err = controls.toggle_flash().await.unwrap_err();
        assert!(err.is_capability_gap());
        assert!(controls.capabilities().await.unwrap().zoom.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_through_controls() {
        let controls = controls(Arc::new(FakeDevices::phone()), Settings::default()).await;
        controls.start_camera().await.unwrap();

        controls.start_recording().await.unwrap();
        assert!(matches!(
            controls.switch_camera().await.unwrap_err(),
            CameraError::InvalidRecordingState { .. }
        ));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        controls.pause_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        controls.resume_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let video = controls.stop_recording().await.unwrap();
        assert_eq!(video.data, b"chunk-1;chunk-2;chunk-3;");
        assert_eq!(video.duration, Duration::from_millis(3700));
        assert_eq!(controls.recording_state().await, RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_recording_keeps_its_start_by_default() {
        let controls = controls(Arc::new(FakeDevices::phone()), Settings::default()).await;
        controls.start_camera().await.unwrap();

        controls.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(8500)).await;
        let video = controls.stop_recording().await.unwrap();

        assert_eq!(video.chunk_count, 8);
        assert!(video.data.starts_with(b"chunk-1;"));
        assert!(video.data.ends_with(b"chunk-8;"));
        assert_eq!(video.source, ArtifactSource::Store);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_cannot_be_reopened_while_recording() {
        let devices = Arc::new(FakeDevices::phone());
        let controls = controls(devices.clone(), Settings::default()).await;
        controls.start_camera().await.unwrap();
        controls.start_recording().await.unwrap();

        let err = controls.start_camera().await.unwrap_err();
        assert!(matches!(err, CameraError::InvalidRecordingState { .. }));
        assert_eq!(devices.stream_count(), 1);
        assert_eq!(devices.live_tracks(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let video = controls.stop_recording().await.unwrap();
        assert_eq!(video.data, b"chunk-1;");

        controls.start_camera().await.unwrap();
        assert_eq!(devices.stream_count(), 2);
    }

    #[tokio::test]
    async fn test_recording_to_chunk_directory() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.recording.chunk_store_dir = Some(dir.path().join("chunks"));
        settings.recording.chunk_interval_ms = 20;
        let controls = controls(Arc::new(FakeDevices::phone()), settings).await;
        controls.start_camera().await.unwrap();

        controls.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let video = controls.stop_recording().await.unwrap();

        assert!(video.chunk_count >= 1);
        assert!(video.data.starts_with(b"chunk-1;"));
        assert_eq!(std::fs::read_dir(dir.path().join("chunks")).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_stops_recording_and_releases_camera() {
        let devices = Arc::new(FakeDevices::phone());
        let controls = controls(devices.clone(), Settings::default()).await;
        controls.start_camera().await.unwrap();
        controls.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let video = controls.visibility_changed(false).await.unwrap();
        assert_eq!(video.map(|v| v.chunk_count), Some(1));
        assert_eq!(devices.live_tracks(), 0);
        assert_eq!(controls.recording_state().await, RecordingState::Idle);

        assert!(controls.visibility_changed(true).await.unwrap().is_none());
        assert_eq!(devices.live_tracks(), 1);
    }

    #[tokio::test]
    async fn test_visible_again_with_vanished_camera() {
        let devices = Arc::new(FakeDevices::phone());
        let controls = controls(devices.clone(), Settings::default()).await;
        controls.start_camera().await.unwrap();
        controls.visibility_changed(false).await.unwrap();

        devices.remove_camera("back-id");
        let err = controls.visibility_changed(true).await.unwrap_err();
        assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_close_releases_everything() {
        let devices = Arc::new(FakeDevices::phone());
        let controls = controls(devices.clone(), Settings::default()).await;
        controls.start_camera().await.unwrap();
        controls.start_recording().await.unwrap();

        controls.close().await;
        assert_eq!(devices.live_tracks(), 0);
        assert_eq!(controls.recording_state().await, RecordingState::Idle);
    }
}
