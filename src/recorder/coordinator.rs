//! Recording coordinator
//!
//! Drives one encoder channel through the recording lifecycle. Encoded data
//! is pulled on every [`tick`](VideoRecorder::tick), persisted chunk by chunk
//! and reassembled into a single artifact on stop.

use super::channel::{EncoderChannel, MediaEncoder};
use super::chunk_store::{Chunk, ChunkStore, MemoryRing};
use super::mime::select_mime;
use super::state::{RecordingSession, RecordingState};
use crate::capture::CaptureSession;
use crate::settings::RecordingSettings;
use crate::share::{MediaBlob, MediaKind};
use crate::utils::error::{CameraError, CameraResult};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecordingEvent {
    /// Recording started
    #[serde(rename_all = "camelCase")]
    Started { recording_id: String, mime: String },
    /// Recording paused
    #[serde(rename_all = "camelCase")]
    Paused { elapsed_ms: u64 },
    /// Recording resumed
    Resumed,
    /// A chunk was kept, durably or in memory
    #[serde(rename_all = "camelCase")]
    ChunkStored {
        recording_id: String,
        size: usize,
        durable: bool,
    },
    /// Recording stopped
    #[serde(rename_all = "camelCase")]
    Stopped { recording_id: String, chunk_count: usize },
    /// Error occurred
    Error { message: String },
}

/// Where the artifact's chunks were read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Store,
    Memory,
    /// The store failed part-way; the ring holds the chunks it refused
    Mixed,
}

/// A finished recording
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub data: Vec<u8>,
    pub mime: String,
    pub recording_id: String,
    pub chunk_count: usize,
    pub source: ArtifactSource,
    /// Recorded time, pauses excluded
    pub duration: Duration,
}

impl MediaBlob for VideoArtifact {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn mime(&self) -> &str {
        &self.mime
    }
}

struct ActiveRecording {
    session: RecordingSession,
    channel: Box<dyn EncoderChannel>,
    chunk_count: usize,
}

/// Chunked video recorder
pub struct VideoRecorder {
    encoder: Arc<dyn MediaEncoder>,
    store: Option<Arc<dyn ChunkStore>>,
    settings: RecordingSettings,
    active: Option<ActiveRecording>,
    ring: MemoryRing,
    last_timestamp: i64,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl VideoRecorder {
    /// Create a recorder; without a store every chunk goes to the memory ring
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        store: Option<Arc<dyn ChunkStore>>,
        settings: RecordingSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            encoder,
            store,
            ring: MemoryRing::new(settings.memory_chunk_limit),
            settings,
            active: None,
            last_timestamp: 0,
            event_tx,
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// Takes effect for the next recording
    pub fn set_settings(&mut self, settings: RecordingSettings) {
        self.ring.set_capacity(settings.memory_chunk_limit);
        self.settings = settings;
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.active
            .as_ref()
            .map(|a| a.session.state)
            .unwrap_or(RecordingState::Idle)
    }

    pub fn recording_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.session.id.as_str())
    }

    /// Recorded time so far, pauses excluded
    pub fn elapsed(&self) -> Duration {
        self.active
            .as_ref()
            .map(|a| a.session.clock.elapsed())
            .unwrap_or_default()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RecordingEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    fn invalid_state(&self, expected: &'static str) -> CameraError {
        CameraError::InvalidRecordingState {
            expected,
            actual: self.state().as_str(),
        }
    }

    /// Start recording the session's live stream
    pub async fn start(&mut self, session: &CaptureSession) -> CameraResult<()> {
        if self.active.is_some() {
            return Err(CameraError::AlreadyRecording);
        }

        let stream = session
            .stream()
            .filter(|_| session.video_track().is_some_and(|t| t.is_live()))
            .ok_or(CameraError::NoActiveStream)?;

        let mime = select_mime(self.encoder.as_ref(), &self.settings.mime_preferences);
        let channel = match self.encoder.open(stream.clone(), mime.as_deref()).await {
            Ok(channel) => channel,
            Err(e) if mime.is_some() => {
                tracing::warn!(
                    "Encoder rejected {:?} ({}), retrying with encoder default",
                    mime,
                    e
                );
                self.encoder
                    .open(stream, None)
                    .await
                    .map_err(|e| CameraError::Platform(format!("cannot create recorder: {e}")))?
            }
            Err(e) => return Err(CameraError::Platform(format!("cannot create recorder: {e}"))),
        };

        let recording = RecordingSession::start(channel.mime());
        tracing::info!("Recording {} started ({})", recording.id, recording.mime);

        self.ring.clear();
        self.emit(RecordingEvent::Started {
            recording_id: recording.id.clone(),
            mime: recording.mime.clone(),
        });
        self.active = Some(ActiveRecording {
            session: recording,
            channel,
            chunk_count: 0,
        });
        Ok(())
    }

    /// Pull encoded data and persist it as a chunk.
    ///
    /// A no-op unless recording, so a tick racing with stop writes nothing.
    pub async fn tick(&mut self) -> CameraResult<()> {
        let (recording_id, data) = {
            let Some(active) = self.active.as_mut() else {
                return Ok(());
            };
            if active.session.state != RecordingState::Recording {
                return Ok(());
            }
            active.session.clock.checkpoint();
            let data = active
                .channel
                .request_data()
                .await
                .map_err(|e| CameraError::Platform(format!("encoder data request failed: {e}")))?;
            (active.session.id.clone(), data)
        };

        if data.is_empty() {
            return Ok(());
        }
        if self.keep_chunk(&recording_id, data).await {
            if let Some(active) = self.active.as_mut() {
                active.chunk_count += 1;
            }
        }
        Ok(())
    }

    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_micros();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    /// Store first, memory ring second. Returns whether the chunk was kept.
    async fn keep_chunk(&mut self, recording_id: &str, data: Vec<u8>) -> bool {
        let chunk = Chunk::new(recording_id, self.next_timestamp(), data);
        let size = chunk.bytes.len();

        let durable = match &self.store {
            Some(store) => match store.put(&chunk).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("{}, keeping chunk {} in memory", CameraError::from(e), chunk.id);
                    false
                }
            },
            None => false,
        };

        if !durable {
            if !self.settings.memory_fallback {
                tracing::warn!("Dropping chunk {} ({} bytes): no storage available", chunk.id, size);
                return false;
            }
            if let Some(evicted) = self.ring.push(chunk) {
                tracing::debug!("Memory ring full, evicted chunk {}", evicted.id);
            }
        }

        tracing::debug!("Chunk stored ({} bytes, durable={})", size, durable);
        self.emit(RecordingEvent::ChunkStored {
            recording_id: recording_id.to_string(),
            size,
            durable,
        });
        true
    }

    /// Pause recording
    pub async fn pause(&mut self) -> CameraResult<()> {
        if self.state() != RecordingState::Recording {
            return Err(self.invalid_state("recording"));
        }
        let active = self.active.as_mut().ok_or(CameraError::InvalidRecordingState {
            expected: "recording",
            actual: RecordingState::Idle.as_str(),
        })?;

        active
            .channel
            .pause()
            .await
            .map_err(|e| CameraError::Platform(format!("cannot pause recorder: {e}")))?;
        active.session.clock.pause();
        active.session.state = RecordingState::Paused;
        let elapsed = active.session.clock.elapsed();

        tracing::info!("Recording paused at {:?}", elapsed);
        self.emit(RecordingEvent::Paused {
            elapsed_ms: elapsed.as_millis() as u64,
        });
        Ok(())
    }

    /// Resume recording
    pub async fn resume(&mut self) -> CameraResult<()> {
        if self.state() != RecordingState::Paused {
            return Err(self.invalid_state("paused"));
        }
        let active = self.active.as_mut().ok_or(CameraError::InvalidRecordingState {
            expected: "paused",
            actual: RecordingState::Idle.as_str(),
        })?;

        active
            .channel
            .resume()
            .await
            .map_err(|e| CameraError::Platform(format!("cannot resume recorder: {e}")))?;
        active.session.clock.resume();
        active.session.state = RecordingState::Recording;

        tracing::info!("Recording resumed");
        self.emit(RecordingEvent::Resumed);
        Ok(())
    }

    /// Stop recording and assemble the artifact.
    ///
    /// The recording's stored chunks are purged whatever the outcome.
    pub async fn stop(&mut self) -> CameraResult<VideoArtifact> {
        let Some(mut active) = self.active.take() else {
            return Err(CameraError::InvalidRecordingState {
                expected: "recording",
                actual: RecordingState::Idle.as_str(),
            });
        };
        active.session.state = RecordingState::Stopped;
        active.session.clock.pause();
        let recording_id = active.session.id.clone();
        tracing::info!("Stopping recording {}", recording_id);

        match active.channel.finish().await {
            Ok(data) if !data.is_empty() => {
                if self.keep_chunk(&recording_id, data).await {
                    active.chunk_count += 1;
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Encoder failed to flush: {}", e),
        }

        let result = self.assemble(&active).await;
        self.purge(&recording_id).await;
        self.ring.clear();

        match &result {
            Ok(artifact) => {
                tracing::info!(
                    "Recording {} stopped: {} chunks, {} bytes, {:?}",
                    recording_id,
                    artifact.chunk_count,
                    artifact.data.len(),
                    artifact.duration
                );
                self.emit(RecordingEvent::Stopped {
                    recording_id,
                    chunk_count: artifact.chunk_count,
                });
            }
            Err(e) => {
                tracing::error!("Recording {} produced no artifact: {}", recording_id, e);
                self.emit(RecordingEvent::Error { message: e.to_string() });
            }
        }
        result
    }

    /// Stored chunks, plus any the ring caught after a failed `put`.
    ///
    /// Chunks are merged by timestamp rather than read from one place, so a
    /// store that fails mid-recording loses nothing the ring still holds.
    async fn assemble(&mut self, active: &ActiveRecording) -> CameraResult<VideoArtifact> {
        let recording_id = &active.session.id;

        let mut chunks = match &self.store {
            Some(store) => store.chunks_for(recording_id).await.unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to memory", CameraError::from(e));
                Vec::new()
            }),
            None => Vec::new(),
        };
        let ring = self.ring.take(recording_id);
        let source = match (chunks.is_empty(), ring.is_empty()) {
            (false, true) => ArtifactSource::Store,
            (false, false) => {
                tracing::warn!(
                    "Recording {} spans the store and {} memory chunks",
                    recording_id,
                    ring.len()
                );
                ArtifactSource::Mixed
            }
            (true, _) => ArtifactSource::Memory,
        };

        chunks.extend(ring);
        chunks.sort_by_key(|c| c.timestamp);
        chunks.dedup_by(|a, b| a.id == b.id);

        tracing::debug!(
            "Assembling {} of {} chunks kept for {}",
            chunks.len(),
            active.chunk_count,
            recording_id
        );
        if chunks.is_empty() {
            return Err(CameraError::EmptyRecording);
        }

        let data: Vec<u8> = chunks.iter().flat_map(|c| c.bytes.iter().copied()).collect();
        if data.is_empty() {
            return Err(CameraError::EmptyArtifact);
        }

        Ok(VideoArtifact {
            data,
            mime: active.session.mime.clone(),
            recording_id: recording_id.clone(),
            chunk_count: chunks.len(),
            source,
            duration: active.session.clock.elapsed(),
        })
    }

    async fn purge(&mut self, recording_id: &str) {
        let Some(store) = &self.store else {
            return;
        };
        match store.purge(recording_id).await {
            Ok(removed) => tracing::debug!("Purged {} stored chunks of {}", removed, recording_id),
            Err(e) => tracing::warn!("Failed to purge chunks of {}: {}", recording_id, e),
        }
    }
}

/// Drive [`VideoRecorder::tick`] every `interval` until the current
/// recording ends.
///
/// The first tick fires one interval after the call.
pub fn spawn_ticker(recorder: Arc<Mutex<VideoRecorder>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(recording_id) = recorder.lock().await.recording_id().map(String::from) else {
            return;
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let mut recorder = recorder.lock().await;
            if recorder.recording_id() != Some(recording_id.as_str()) {
                break;
            }
            if let Err(e) = recorder.tick().await {
                tracing::error!("Recording tick failed: {}", e);
                recorder.emit(RecordingEvent::Error { message: e.to_string() });
            }
        }
        tracing::debug!("Ticker for {} finished", recording_id);
    })
}
