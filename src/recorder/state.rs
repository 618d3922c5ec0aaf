//! Recording state management
//!
//! Defines the recording state machine, session identity and the elapsed
//! clock that excludes paused time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Stop requested, artifact being assembled
    Stopped,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Stopped => "stopped",
        }
    }
}

static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Time-derived recording id, unique within the process (`rec_<millis>`)
pub fn new_recording_id() -> String {
    let now = Utc::now().timestamp_millis();
    let millis = match LAST_ID_MILLIS.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    }) {
        Ok(last) | Err(last) => now.max(last + 1),
    };
    format!("rec_{millis}")
}

/// Wall time spent recording, excluding pauses
#[derive(Debug, Clone, Default)]
pub struct ElapsedClock {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl ElapsedClock {
    pub fn started() -> Self {
        Self {
            accumulated: Duration::ZERO,
            running_since: Some(Instant::now()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Fold the running segment into the total
    pub fn checkpoint(&mut self) {
        if let Some(since) = self.running_since {
            let now = Instant::now();
            self.accumulated += now.duration_since(since);
            self.running_since = Some(now);
        }
    }

    pub fn pause(&mut self) {
        self.checkpoint();
        self.running_since = None;
    }

    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
            + self
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or_default()
    }
}

/// The recording currently owned by the recorder
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: String,
    /// Format the encoder actually produces
    pub mime: String,
    pub state: RecordingState,
    pub clock: ElapsedClock,
}

impl RecordingSession {
    pub fn start(mime: String) -> Self {
        Self {
            id: new_recording_id(),
            mime,
            state: RecordingState::Recording,
            clock: ElapsedClock::started(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_ids_are_unique() {
        let ids: Vec<String> = (0..50).map(|_| new_recording_id()).collect();
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
        assert!(ids.iter().all(|id| id.starts_with("rec_")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_excludes_paused_time() {
        let mut clock = ElapsedClock::started();
        tokio::time::advance(Duration::from_secs(2)).await;
        clock.pause();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.elapsed(), Duration::from_secs(2));

        clock.resume();
        tokio::time::advance(Duration::from_millis(500)).await;
        clock.checkpoint();
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
    }
}
