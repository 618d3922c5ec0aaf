//! Video recording module
//!
//! This module implements chunked recording:
//! - MediaEncoder/EncoderChannel traits for the platform encoder
//! - VideoRecorder to drive the recording lifecycle
//! - Chunk stores for durable and in-memory chunk retention

pub mod channel;
pub mod chunk_store;
pub mod coordinator;
pub mod mime;
pub mod state;

pub use channel::{EncoderChannel, MediaEncoder};
pub use chunk_store::{Chunk, ChunkStore, FsChunkStore, MemoryChunkStore, MemoryRing};
pub use coordinator::{spawn_ticker, ArtifactSource, RecordingEvent, VideoArtifact, VideoRecorder};
pub use state::{RecordingSession, RecordingState};
