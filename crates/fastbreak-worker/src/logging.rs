//! Structured match logging utilities.
//!
//! Provides consistent, structured logging for match processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use fastbreak_models::MatchId;

/// Match logger for structured logging with consistent formatting.
///
/// Every line carries the match id and the operation, so interleaved
/// output from concurrent matches stays attributable.
#[derive(Debug, Clone)]
pub struct MatchLogger {
    match_id: String,
    operation: String,
}

impl MatchLogger {
    /// Create a new logger for a match and operation.
    pub fn new(match_id: &MatchId, operation: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a match operation.
    pub fn log_start(&self, message: &str) {
        info!(
            match_id = %self.match_id,
            operation = %self.operation,
            "Match started: {}", message
        );
    }

    /// Log a progress update.
    pub fn log_progress(&self, message: &str) {
        info!(
            match_id = %self.match_id,
            operation = %self.operation,
            "Match progress: {}", message
        );
    }

    /// Log a recoverable problem tied to a frame.
    pub fn log_frame_warning(&self, frame_index: Option<u64>, message: &str) {
        warn!(
            match_id = %self.match_id,
            operation = %self.operation,
            frame_index = ?frame_index,
            "Frame warning: {}", message
        );
    }

    /// Log an error.
    pub fn log_error(&self, message: &str) {
        error!(
            match_id = %self.match_id,
            operation = %self.operation,
            "Match error: {}", message
        );
    }

    /// Log the end of a match operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            match_id = %self.match_id,
            operation = %self.operation,
            "Match finished: {}", message
        );
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this match.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "match",
            match_id = %self.match_id,
            operation = %self.operation
        )
    }
}
