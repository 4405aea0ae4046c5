//! Match job status for progress tracking and polling.
//!
//! The pipeline updates a [`MatchStatusCache`] after each frame batch; external
//! callers poll it through whichever status store backs the worker.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::MatchId;

/// Match processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Match is queued waiting for a worker
    #[default]
    Queued,
    /// Match is actively being processed
    Processing,
    /// All frames were processed
    Completed,
    /// Processing aborted with an error
    Failed,
    /// Processing was stopped on request
    Cancelled,
}

impl MatchStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Queued => "queued",
            MatchStatus::Processing => "processing",
            MatchStatus::Completed => "completed",
            MatchStatus::Failed => "failed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Completed | MatchStatus::Failed | MatchStatus::Cancelled
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cached match status for fast polling queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchStatusCache {
    /// Match being processed
    pub match_id: MatchId,
    /// Current status
    pub status: MatchStatus,
    /// Processed fraction (0.0-1.0), never decreases while running
    pub progress: f64,
    /// Frames processed so far
    pub frames_processed: u64,
    /// Total frames, when the source knows it
    pub total_frames: Option<u64>,
    /// Fast-break events written so far
    pub events_emitted: u32,
    /// Error message if the match failed
    pub error_message: Option<String>,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// When the status was last updated
    pub updated_at: DateTime<Utc>,
    /// Sequence number for update ordering (monotonically increasing)
    pub event_seq: u64,
}

impl MatchStatusCache {
    /// Create a new queued status entry.
    pub fn new(match_id: MatchId) -> Self {
        let now = Utc::now();
        Self {
            match_id,
            status: MatchStatus::Queued,
            progress: 0.0,
            frames_processed: 0,
            total_frames: None,
            events_emitted: 0,
            error_message: None,
            started_at: now,
            updated_at: now,
            event_seq: 0,
        }
    }

    /// Check if the match is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the match as processing.
    pub fn start(&mut self, total_frames: Option<u64>) {
        let now = Utc::now();
        self.status = MatchStatus::Processing;
        self.total_frames = total_frames;
        self.started_at = now;
        self.updated_at = now;
        self.event_seq += 1;
    }

    /// Record processed frames and recompute progress.
    ///
    /// Progress never moves backwards; a shrinking frame count is ignored.
    pub fn record_frames(&mut self, frames_processed: u64) {
        self.frames_processed = self.frames_processed.max(frames_processed);
        if let Some(total) = self.total_frames.filter(|t| *t > 0) {
            let fraction = (self.frames_processed as f64 / total as f64).min(1.0);
            self.set_progress(fraction);
        } else {
            self.updated_at = Utc::now();
            self.event_seq += 1;
        }
    }

    /// Update progress and bump event sequence. Lower values are ignored.
    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() {
            self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        }
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    /// Mark match as completed.
    pub fn complete(&mut self) {
        self.status = MatchStatus::Completed;
        self.progress = 1.0;
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    /// Mark match as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = MatchStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    /// Mark match as cancelled.
    pub fn cancel(&mut self) {
        self.status = MatchStatus::Cancelled;
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    /// Reset to a fresh queued state (the only way progress goes down).
    pub fn reset(&mut self) {
        *self = Self::new(self.match_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_cache_creation() {
        let cache = MatchStatusCache::new(MatchId::from("match-1"));
        assert_eq!(cache.status, MatchStatus::Queued);
        assert_eq!(cache.progress, 0.0);
        assert!(!cache.is_terminal());
    }

    #[test]
    fn test_status_transitions() {
        let mut cache = MatchStatusCache::new(MatchId::from("match-1"));

        cache.start(Some(200));
        assert_eq!(cache.status, MatchStatus::Processing);

        cache.record_frames(50);
        assert!((cache.progress - 0.25).abs() < 1e-9);

        cache.complete();
        assert_eq!(cache.status, MatchStatus::Completed);
        assert_eq!(cache.progress, 1.0);
        assert!(cache.is_terminal());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut cache = MatchStatusCache::new(MatchId::from("match-1"));
        cache.start(Some(100));

        cache.record_frames(60);
        cache.record_frames(40);
        assert!((cache.progress - 0.6).abs() < 1e-9);

        cache.set_progress(0.1);
        assert!((cache.progress - 0.6).abs() < 1e-9);

        let seq = cache.event_seq;
        cache.set_progress(f64::NAN);
        assert!((cache.progress - 0.6).abs() < 1e-9);
        assert_eq!(cache.event_seq, seq + 1);
    }

    #[test]
    fn test_cancelled_is_terminal_and_distinct() {
        let mut cache = MatchStatusCache::new(MatchId::from("match-1"));
        cache.start(None);
        cache.cancel();
        assert_eq!(cache.status, MatchStatus::Cancelled);
        assert!(cache.is_terminal());
        assert!(cache.error_message.is_none());
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut cache = MatchStatusCache::new(MatchId::from("match-1"));
        cache.start(Some(10));
        cache.record_frames(10);
        cache.reset();
        assert_eq!(cache.progress, 0.0);
        assert_eq!(cache.status, MatchStatus::Queued);
        assert_eq!(cache.match_id.as_str(), "match-1");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&MatchStatus::Cancelled).unwrap(), r#""cancelled""#);
    }
}
