//! In-memory platform used by the unit tests

use super::traits::{
    CapabilityDescriptor, Device, FacingMode, MediaConstraints, MediaDevices, MediaStream,
    PreviewSurface, RangeDescriptor, Resolution, TrackConstraint, TrackSettings, VideoTrack,
};
use crate::recorder::channel::{EncoderChannel, MediaEncoder};
use crate::utils::error::PlatformError;
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Largest resolution the fake hardware grants
pub const MAX_FAKE_RESOLUTION: Resolution = Resolution::HD;

/// Two-colour test frame: left half red, right half blue
pub fn split_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    })
}

pub struct FakeTrack {
    id: String,
    settings: Mutex<TrackSettings>,
    descriptor: Option<CapabilityDescriptor>,
    live: AtomicBool,
    fail_constraints: AtomicBool,
    applied: Mutex<Vec<TrackConstraint>>,
    grab: Mutex<Option<RgbaImage>>,
}

impl FakeTrack {
    pub fn new(
        device_id: &str,
        facing: FacingMode,
        descriptor: Option<CapabilityDescriptor>,
    ) -> Self {
        Self {
            id: format!("track-{device_id}"),
            settings: Mutex::new(TrackSettings {
                device_id: Some(device_id.to_string()),
                width: MAX_FAKE_RESOLUTION.width,
                height: MAX_FAKE_RESOLUTION.height,
                facing_mode: Some(facing),
            }),
            descriptor,
            live: AtomicBool::new(true),
            fail_constraints: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
            grab: Mutex::new(None),
        }
    }

    pub fn fail_constraints(&self, fail: bool) {
        self.fail_constraints.store(fail, Ordering::SeqCst);
    }

    /// Make the enhanced frame grab succeed with `frame`
    pub fn set_grab_frame(&self, frame: Option<RgbaImage>) {
        *self.grab.lock() = frame;
    }

    pub fn applied_zoom(&self) -> Option<f64> {
        self.applied.lock().iter().rev().find_map(|c| match c {
            TrackConstraint::Zoom(z) => Some(*z),
            TrackConstraint::Torch(_) => None,
        })
    }

    pub fn applied_torch(&self) -> Option<bool> {
        self.applied.lock().iter().rev().find_map(|c| match c {
            TrackConstraint::Torch(t) => Some(*t),
            TrackConstraint::Zoom(_) => None,
        })
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> TrackSettings {
        self.settings.lock().clone()
    }

    fn capabilities(&self) -> Option<CapabilityDescriptor> {
        self.descriptor.clone()
    }

    async fn apply_constraint(&self, constraint: TrackConstraint) -> Result<(), PlatformError> {
        if self.fail_constraints.load(Ordering::SeqCst) {
            return Err(PlatformError::Other("constraint rejected".to_string()));
        }
        self.applied.lock().push(constraint);
        Ok(())
    }

    async fn grab_frame(&self) -> Result<RgbaImage, PlatformError> {
        self.grab
            .lock()
            .clone()
            .ok_or_else(|| PlatformError::NotSupported("frame grab".to_string()))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeStream {
    id: String,
    tracks: Vec<Arc<FakeTrack>>,
    audio_live: AtomicBool,
}

impl FakeStream {
    pub fn track(&self) -> Option<Arc<FakeTrack>> {
        self.tracks.first().cloned()
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        self.tracks
            .iter()
            .map(|t| t.clone() as Arc<dyn VideoTrack>)
            .collect()
    }

    fn has_audio(&self) -> bool {
        self.audio_live.load(Ordering::SeqCst)
    }

    fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
        self.audio_live.store(false, Ordering::SeqCst);
    }

    fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count() + usize::from(self.has_audio())
    }
}

#[derive(Clone)]
pub struct FakeCamera {
    pub device: Device,
    pub facing: FacingMode,
    pub descriptor: Option<CapabilityDescriptor>,
    pub rejects_constraints: bool,
}

impl FakeCamera {
    pub fn new(id: &str, label: &str, facing: FacingMode) -> Self {
        Self {
            device: Device::video(id, label),
            facing,
            descriptor: None,
            rejects_constraints: false,
        }
    }

    /// Tracks from this camera refuse every zoom/torch constraint
    pub fn rejecting_constraints(mut self) -> Self {
        self.rejects_constraints = true;
        self
    }

    pub fn with_zoom(mut self, min: f64, max: f64) -> Self {
        let mut descriptor = self.descriptor.unwrap_or_default();
        descriptor.zoom = Some(RangeDescriptor {
            min,
            max,
            step: Some(0.1),
        });
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_torch(mut self) -> Self {
        let mut descriptor = self.descriptor.unwrap_or_default();
        descriptor.torch = Some(true);
        self.descriptor = Some(descriptor);
        self
    }
}

#[derive(Default)]
pub struct FakeDevices {
    cameras: Mutex<Vec<FakeCamera>>,
    deny: AtomicBool,
    no_video: AtomicBool,
    streams: Mutex<Vec<Arc<FakeStream>>>,
    requests: Mutex<Vec<MediaConstraints>>,
    counter: AtomicUsize,
}

impl FakeDevices {
    pub fn with_cameras(cameras: Vec<FakeCamera>) -> Self {
        let devices = Self::default();
        *devices.cameras.lock() = cameras;
        devices
    }

    /// A phone: front camera with torchless selfie optics, back camera with zoom and torch
    pub fn phone() -> Self {
        Self::with_cameras(vec![
            FakeCamera::new("front-id", "Front Camera", FacingMode::User),
            FakeCamera::new("back-id", "Back Camera", FacingMode::Environment)
                .with_zoom(1.0, 8.0)
                .with_torch(),
        ])
    }

    pub fn deny_access(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn return_no_video(&self, no_video: bool) {
        self.no_video.store(no_video, Ordering::SeqCst);
    }

    pub fn remove_camera(&self, id: &str) {
        self.cameras.lock().retain(|c| c.device.id != id);
    }

    /// Live tracks across every stream ever handed out
    pub fn live_tracks(&self) -> usize {
        self.streams.lock().iter().map(|s| s.live_tracks()).sum()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.streams.lock().last().cloned()
    }

    pub fn last_request(&self) -> Option<MediaConstraints> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn enumerate_devices(&self) -> Result<Vec<Device>, PlatformError> {
        let mut devices: Vec<Device> = self.cameras.lock().iter().map(|c| c.device.clone()).collect();
        devices.push(Device::audio("mic-id", "Built-in Microphone"));
        Ok(devices)
    }

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Arc<dyn MediaStream>, PlatformError> {
        self.requests.lock().push(constraints.clone());

        if self.deny.load(Ordering::SeqCst) {
            return Err(PlatformError::NotAllowed("user dismissed the prompt".to_string()));
        }

        let camera = {
            let cameras = self.cameras.lock();
            match (&constraints.video.device_id, constraints.video.facing_mode) {
                (Some(id), _) => cameras
                    .iter()
                    .find(|c| &c.device.id == id)
                    .cloned()
                    .ok_or_else(|| PlatformError::OverConstrained(format!("deviceId {id}")))?,
                (None, Some(facing)) => cameras
                    .iter()
                    .find(|c| c.facing == facing)
                    .or_else(|| cameras.first())
                    .cloned()
                    .ok_or_else(|| PlatformError::NotFound("no camera".to_string()))?,
                (None, None) => cameras
                    .first()
                    .cloned()
                    .ok_or_else(|| PlatformError::NotFound("no camera".to_string()))?,
            }
        };

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let tracks = if self.no_video.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            let track = FakeTrack::new(&camera.device.id, camera.facing, camera.descriptor.clone());
            track.fail_constraints(camera.rejects_constraints);
            {
                let mut settings = track.settings.lock();
                let ideal = constraints.video.ideal_resolution;
                settings.width = ideal.width.min(MAX_FAKE_RESOLUTION.width);
                settings.height = ideal.height.min(MAX_FAKE_RESOLUTION.height);
            }
            vec![Arc::new(track)]
        };

        let stream = Arc::new(FakeStream {
            id: format!("stream-{n}"),
            tracks,
            audio_live: AtomicBool::new(constraints.audio),
        });
        self.streams.lock().push(stream.clone());
        Ok(stream)
    }
}

#[derive(Default)]
pub struct FakePreview {
    frame: Mutex<Option<RgbaImage>>,
}

impl FakePreview {
    pub fn showing(frame: RgbaImage) -> Self {
        Self {
            frame: Mutex::new(Some(frame)),
        }
    }
}

impl PreviewSurface for FakePreview {
    fn snapshot(&self) -> Option<RgbaImage> {
        self.frame.lock().clone()
    }
}

/// Encoder emitting `chunk-N;` each time data is requested
pub struct FakeEncoder {
    supported: Vec<String>,
    reject_explicit_mime: AtomicBool,
    opened_with: Mutex<Vec<Option<String>>>,
    trailing_data: AtomicBool,
}

impl FakeEncoder {
    pub fn supporting(mimes: &[&str]) -> Self {
        Self {
            supported: mimes.iter().map(|m| m.to_string()).collect(),
            reject_explicit_mime: AtomicBool::new(false),
            opened_with: Mutex::new(Vec::new()),
            trailing_data: AtomicBool::new(false),
        }
    }

    pub fn reject_explicit_mime(&self, reject: bool) {
        self.reject_explicit_mime.store(reject, Ordering::SeqCst);
    }

    /// Emit one last piece of data when the recording finishes
    pub fn trailing_data(&self, trailing: bool) {
        self.trailing_data.store(trailing, Ordering::SeqCst);
    }

    pub fn opened_with(&self) -> Vec<Option<String>> {
        self.opened_with.lock().clone()
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.supported.iter().any(|m| m == mime)
    }

    fn default_mime(&self) -> String {
        "video/webm".to_string()
    }

    async fn open(
        &self,
        stream: Arc<dyn MediaStream>,
        mime: Option<&str>,
    ) -> Result<Box<dyn EncoderChannel>, PlatformError> {
        self.opened_with.lock().push(mime.map(String::from));
        if mime.is_some() && self.reject_explicit_mime.load(Ordering::SeqCst) {
            return Err(PlatformError::NotSupported("mimeType".to_string()));
        }
        Ok(Box::new(FakeEncoderChannel {
            stream,
            mime: mime.map(String::from).unwrap_or_else(|| self.default_mime()),
            emitted: 0,
            paused: false,
            trailing: self.trailing_data.load(Ordering::SeqCst),
        }))
    }
}

struct FakeEncoderChannel {
    stream: Arc<dyn MediaStream>,
    mime: String,
    emitted: usize,
    paused: bool,
    trailing: bool,
}

impl FakeEncoderChannel {
    fn emit(&mut self) -> Vec<u8> {
        self.emitted += 1;
        format!("chunk-{};", self.emitted).into_bytes()
    }
}

#[async_trait]
impl EncoderChannel for FakeEncoderChannel {
    fn mime(&self) -> String {
        self.mime.clone()
    }

    async fn request_data(&mut self) -> Result<Vec<u8>, PlatformError> {
        if self.paused || self.stream.live_tracks() == 0 {
            return Ok(Vec::new());
        }
        Ok(self.emit())
    }

    async fn pause(&mut self) -> Result<(), PlatformError> {
        self.paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), PlatformError> {
        self.paused = false;
        Ok(())
    }

    async fn finish(&mut self) -> Result<Vec<u8>, PlatformError> {
        if self.trailing {
            Ok(self.emit())
        } else {
            Ok(Vec::new())
        }
    }
}
