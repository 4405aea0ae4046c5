//! Fast-break events handed to external storage.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MatchId, PossessionEvent, Velocity, Zone};

/// Event type tag stored with every fast-break record.
pub const FAST_BREAK_EVENT_TYPE: &str = "fast_break";

/// One ball position observed during a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrajectorySample {
    pub frame_index: u64,
    /// Timestamp in seconds
    pub timestamp: f64,
    /// Ball center x in pixels
    pub x: f64,
    /// Ball center y in pixels
    pub y: f64,
    /// Zone containing the ball center
    pub zone: Zone,
}

/// The ball suddenly moving faster than the kick threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BallKick {
    pub frame_index: u64,
    /// Timestamp in seconds
    pub timestamp: f64,
    /// Tracker id of the ball
    pub ball_id: u64,
    pub x: f64,
    pub y: f64,
    pub velocity: Velocity,
    /// Speed in pixels per second
    pub speed: f64,
}

/// Detailed payload of a fast-break event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FastBreakEventData {
    /// Ordered passes making up the sequence
    pub passes: Vec<PossessionEvent>,
    /// Ball positions observed between the first and last pass
    pub ball_trajectory: Vec<TrajectorySample>,
    /// Players involved, in order of first touch
    pub player_ids: Vec<u64>,
    /// Zones touched by the passes, in order
    pub zones_touched: Vec<Zone>,
    /// Kicks detected between the first and last pass
    #[serde(default)]
    pub kicks: Vec<BallKick>,
    /// Mean ball speed over the trajectory in pixels per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_velocity: Option<f64>,
}

/// A flagged fast-break sequence, immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FastBreakEvent {
    /// Unique event id
    pub id: String,
    /// Match this event belongs to
    pub match_id: MatchId,
    /// Always [`FAST_BREAK_EVENT_TYPE`]
    pub event_type: String,
    /// Name of the rule that flagged the sequence
    pub rule: String,
    /// Sequence number within the match
    pub sequence_id: u64,
    /// Timestamp of the first pass in seconds
    pub start_time: f64,
    /// Timestamp of the last pass in seconds
    pub end_time: f64,
    /// `end_time - start_time`
    pub duration: f64,
    pub zone_sum: u32,
    pub pass_count: u32,
    /// Confidence score in [0, 1]
    pub confidence_score: f64,
    pub event_data: FastBreakEventData,
    pub created_at: DateTime<Utc>,
}

impl FastBreakEvent {
    /// Generate a fresh event id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}
