//! Native desktop backend using nokhwa (cameras) and cpal (microphones)
//!
//! Each stream runs its camera on a dedicated thread that keeps the latest
//! decoded frame. The track's frame grab and [`NativeDevices::preview`] both
//! read it. Stopping a stream joins that thread, so the device is closed
//! before a new stream can ask for it.

use super::devices::{classify, DeviceClass};
use super::traits::{
    CapabilityDescriptor, Device, MediaConstraints, MediaDevices, MediaStream, PreviewSurface,
    TrackConstraint, TrackSettings, VideoTrack,
};
use crate::utils::error::PlatformError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use image::RgbaImage;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

type LatestFrame = Arc<Mutex<Option<RgbaImage>>>;

fn index_id(index: &CameraIndex) -> String {
    match index {
        CameraIndex::Index(i) => i.to_string(),
        CameraIndex::String(s) => s.to_string(),
    }
}

fn parse_index(id: &str) -> CameraIndex {
    id.parse::<u32>()
        .map(CameraIndex::Index)
        .unwrap_or_else(|_| CameraIndex::String(id.to_string()))
}

fn list_cameras() -> Result<Vec<Device>, PlatformError> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| PlatformError::Other(format!("camera enumeration failed: {e}")))?;
    Ok(cameras
        .into_iter()
        .map(|info| Device::video(index_id(info.index()), info.human_name()))
        .collect())
}

fn list_microphones() -> Vec<Device> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|d| d.name().ok())
            .map(|name| Device::audio(name.clone(), name))
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio inputs: {}", e);
            Vec::new()
        }
    }
}

fn pick_camera(constraints: &MediaConstraints) -> Result<Device, PlatformError> {
    let cameras = list_cameras()?;
    if let Some(id) = &constraints.video.device_id {
        return cameras
            .into_iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| PlatformError::OverConstrained(format!("deviceId {id}")));
    }

    let wanted = constraints.video.facing_mode;
    let preferred = cameras
        .iter()
        .find(|c| {
            let class = classify(c);
            class != DeviceClass::External && Some(class.facing_mode()) == wanted
        })
        .or_else(|| cameras.first())
        .cloned();
    preferred.ok_or_else(|| PlatformError::NotFound("no camera attached".to_string()))
}

/// Map a camera open failure onto the platform taxonomy.
///
/// nokhwa reports every backend failure as text, so only messages that
/// read like an authorisation problem become `NotAllowed`.
fn open_error(message: String) -> PlatformError {
    let lower = message.to_lowercase();
    if ["permission", "denied", "not authorized", "unauthorized"]
        .iter()
        .any(|k| lower.contains(k))
    {
        PlatformError::NotAllowed(message)
    } else if ["not found", "no such", "no device", "does not exist"]
        .iter()
        .any(|k| lower.contains(k))
    {
        PlatformError::NotFound(message)
    } else {
        PlatformError::Other(message)
    }
}

/// Cameras and microphones attached to this machine
#[derive(Debug, Default)]
pub struct NativeDevices {
    counter: AtomicUsize,
    latest: LatestFrame,
}

impl NativeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preview of whichever stream is currently open.
    ///
    /// Empty while no stream is live.
    pub fn preview(&self) -> NativePreview {
        NativePreview {
            latest: self.latest.clone(),
        }
    }
}

#[async_trait]
impl MediaDevices for NativeDevices {
    async fn enumerate_devices(&self) -> Result<Vec<Device>, PlatformError> {
        tokio::task::spawn_blocking(|| {
            let mut devices = list_cameras()?;
            devices.extend(list_microphones());
            Ok(devices)
        })
        .await
        .map_err(|e| PlatformError::Other(format!("enumeration task failed: {e}")))?
    }

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Arc<dyn MediaStream>, PlatformError> {
        let request = constraints.clone();
        let camera = tokio::task::spawn_blocking(move || pick_camera(&request))
            .await
            .map_err(|e| PlatformError::Other(format!("camera lookup task failed: {e}")))??;
        let facing = classify(&camera).facing_mode();
        let n = self.counter.fetch_add(1, Ordering::SeqCst);

        let live = Arc::new(AtomicBool::new(true));
        let latest = self.latest.clone();
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_live = live.clone();
        let thread_latest = latest.clone();
        let index = parse_index(&camera.id);
        let worker = std::thread::spawn(move || run_camera(index, thread_live, thread_latest, ready_tx));

        let opened = ready_rx
            .await
            .map_err(|_| PlatformError::Other("camera thread exited".to_string()));
        let (width, height) = match opened.and_then(|r| r) {
            Ok(size) => size,
            Err(e) => {
                let _ = worker.join();
                return Err(e);
            }
        };

        if constraints.audio {
            tracing::warn!("Microphone capture is not available on the native backend");
        }

        let track = Arc::new(NativeTrack {
            id: format!("native-video-{n}"),
            settings: TrackSettings {
                device_id: Some(camera.id.clone()),
                width,
                height,
                facing_mode: Some(facing),
            },
            live: live.clone(),
            latest: latest.clone(),
        });
        tracing::info!("Opened {} ({}x{})", camera.label, width, height);

        Ok(Arc::new(NativeStream {
            id: format!("native-stream-{n}"),
            track,
            worker: Mutex::new(Some(worker)),
        }))
    }
}

fn run_camera(
    index: CameraIndex,
    live: Arc<AtomicBool>,
    latest: LatestFrame,
    ready: oneshot::Sender<Result<(u32, u32), PlatformError>>,
) {
    let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
    let mut camera = match Camera::new(index.clone(), format) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!("Failed to open camera {:?}: {:?}", index, e);
            let _ = ready.send(Err(open_error(e.to_string())));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open camera stream: {:?}", e);
        let _ = ready.send(Err(open_error(e.to_string())));
        return;
    }

    let resolution = camera.camera_format().resolution();
    let _ = ready.send(Ok((resolution.width(), resolution.height())));

    while live.load(Ordering::SeqCst) {
        // Blocks until the camera delivers the next frame
        match camera.frame().and_then(|buffer| buffer.decode_image::<RgbAFormat>()) {
            Ok(decoded) => {
                let (width, height) = (decoded.width(), decoded.height());
                if let Some(frame) = RgbaImage::from_raw(width, height, decoded.into_raw()) {
                    *latest.lock() = Some(frame);
                }
            }
            Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }
    *latest.lock() = None;
    tracing::info!("Camera thread for {:?} stopped", index);
}

/// Video track backed by a camera thread
pub struct NativeTrack {
    id: String,
    settings: TrackSettings,
    live: Arc<AtomicBool>,
    latest: LatestFrame,
}

#[async_trait]
impl VideoTrack for NativeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn capabilities(&self) -> Option<CapabilityDescriptor> {
        None
    }

    async fn apply_constraint(&self, constraint: TrackConstraint) -> Result<(), PlatformError> {
        Err(PlatformError::NotSupported(format!("{constraint:?}")))
    }

    async fn grab_frame(&self) -> Result<RgbaImage, PlatformError> {
        self.latest
            .lock()
            .clone()
            .ok_or_else(|| PlatformError::NotSupported("no frame delivered yet".to_string()))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct NativeStream {
    id: String,
    track: Arc<NativeTrack>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MediaStream for NativeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        vec![self.track.clone() as Arc<dyn VideoTrack>]
    }

    fn has_audio(&self) -> bool {
        false
    }

    /// Blocks until the camera thread has closed the device
    fn stop_all(&self) {
        self.track.live.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("Camera thread for {} panicked", self.id);
            }
        }
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.track.is_live())
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Latest camera frame as a preview
#[derive(Clone)]
pub struct NativePreview {
    latest: LatestFrame,
}

impl PreviewSurface for NativePreview {
    fn snapshot(&self) -> Option<RgbaImage> {
        self.latest.lock().clone()
    }
}
