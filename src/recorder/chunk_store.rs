//! Chunk storage
//!
//! Recorded chunks are written to a durable store as they arrive so a long
//! recording never has to live in memory. When the store is missing or
//! failing, the recorder keeps the most recent chunks in a [`MemoryRing`].

use crate::utils::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// One piece of encoded recording data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `{recording_id}_{timestamp}`
    pub id: String,
    pub recording_id: String,
    pub bytes: Vec<u8>,
    /// Microseconds since the Unix epoch, strictly increasing per recording
    pub timestamp: i64,
}

impl Chunk {
    pub fn new(recording_id: &str, timestamp: i64, bytes: Vec<u8>) -> Self {
        Self {
            id: format!("{recording_id}_{timestamp}"),
            recording_id: recording_id.to_string(),
            bytes,
            timestamp,
        }
    }
}

/// Durable chunk storage keyed by recording id and timestamp
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn put(&self, chunk: &Chunk) -> Result<(), StoreError>;

    /// Every chunk of a recording, oldest first
    async fn chunks_for(&self, recording_id: &str) -> Result<Vec<Chunk>, StoreError>;

    /// Delete a recording's chunks; returns how many were removed
    async fn purge(&self, recording_id: &str) -> Result<usize, StoreError>;
}

const CHUNK_EXTENSION: &str = "chunk";

/// One file per chunk in a directory
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    dir: PathBuf,
}

impl FsChunkStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!("Chunk store at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, chunk: &Chunk) -> PathBuf {
        self.dir.join(format!("{}.{}", chunk.id, CHUNK_EXTENSION))
    }

    /// Timestamp encoded in a chunk file name belonging to `recording_id`
    fn parse_name(recording_id: &str, file_name: &str) -> Option<i64> {
        file_name
            .strip_suffix(CHUNK_EXTENSION)?
            .strip_suffix('.')?
            .strip_prefix(recording_id)?
            .strip_prefix('_')?
            .parse()
            .ok()
    }

    async fn entries_for(&self, recording_id: &str) -> Result<Vec<(i64, PathBuf)>, StoreError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(timestamp) = Self::parse_name(recording_id, name) {
                entries.push((timestamp, entry.path()));
            }
        }
        entries.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(entries)
    }
}

#[async_trait]
impl ChunkStore for FsChunkStore {
    async fn put(&self, chunk: &Chunk) -> Result<(), StoreError> {
        tokio::fs::write(self.chunk_path(chunk), &chunk.bytes).await?;
        Ok(())
    }

    async fn chunks_for(&self, recording_id: &str) -> Result<Vec<Chunk>, StoreError> {
        let mut chunks = Vec::new();
        for (timestamp, path) in self.entries_for(recording_id).await? {
            let bytes = tokio::fs::read(&path).await?;
            chunks.push(Chunk::new(recording_id, timestamp, bytes));
        }
        Ok(chunks)
    }

    async fn purge(&self, recording_id: &str) -> Result<usize, StoreError> {
        let entries = self.entries_for(recording_id).await?;
        for (_, path) in &entries {
            tokio::fs::remove_file(path).await?;
        }
        Ok(entries.len())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<HashMap<String, Vec<Chunk>>>,
    closed: Mutex<bool>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every further operation with [`StoreError::Closed`]
    pub fn close(&self) {
        *self.closed.lock() = true;
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if *self.closed.lock() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put(&self, chunk: &Chunk) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut chunks = self.chunks.lock();
        let entries = chunks.entry(chunk.recording_id.clone()).or_default();
        if entries.iter().any(|c| c.id == chunk.id) {
            return Err(StoreError::InvalidEntry(format!("duplicate chunk {}", chunk.id)));
        }
        entries.push(chunk.clone());
        Ok(())
    }

    async fn chunks_for(&self, recording_id: &str) -> Result<Vec<Chunk>, StoreError> {
        self.ensure_open()?;
        let mut chunks = self
            .chunks
            .lock()
            .get(recording_id)
            .cloned()
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.timestamp);
        Ok(chunks)
    }

    async fn purge(&self, recording_id: &str) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self
            .chunks
            .lock()
            .remove(recording_id)
            .map(|c| c.len())
            .unwrap_or(0))
    }
}

/// The N most recent chunks, oldest evicted first
#[derive(Debug, Clone)]
pub struct MemoryRing {
    capacity: usize,
    chunks: VecDeque<Chunk>,
}

impl MemoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chunks: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.chunks.len() > capacity {
            self.chunks.pop_front();
        }
    }

    /// Add a chunk; returns the chunk that fell out, if any
    pub fn push(&mut self, chunk: Chunk) -> Option<Chunk> {
        if self.capacity == 0 {
            return Some(chunk);
        }
        let evicted = if self.chunks.len() >= self.capacity {
            self.chunks.pop_front()
        } else {
            None
        };
        self.chunks.push_back(chunk);
        evicted
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Remove and return a recording's chunks, oldest first
    pub fn take(&mut self, recording_id: &str) -> Vec<Chunk> {
        let (mut taken, kept): (Vec<Chunk>, Vec<Chunk>) =
            self.chunks.drain(..).partition(|c| c.recording_id == recording_id);
        self.chunks.extend(kept);
        taken.sort_by_key(|c| c.timestamp);
        taken
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
