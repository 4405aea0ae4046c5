//! Shared data models for the fast-break analysis pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Raw per-frame detections and tracked objects
//! - Pitch zones and zone heatmaps
//! - Possession transfers (passes)
//! - Fast-break events and their nested event data
//! - Match job status for polling

pub mod detection;
pub mod event;
pub mod geometry;
pub mod match_id;
pub mod possession;
pub mod status;
pub mod tracked;
pub mod zone;

// Re-export common types
pub use detection::{FrameRecord, ObjectClass, RawDetection};
pub use event::{BallKick, FastBreakEvent, FastBreakEventData, TrajectorySample, FAST_BREAK_EVENT_TYPE};
pub use geometry::{BoundingBox, Point};
pub use match_id::MatchId;
pub use possession::PossessionEvent;
pub use status::{MatchStatus, MatchStatusCache};
pub use tracked::{TrackedObject, Velocity};
pub use zone::{Zone, ZoneError, ZoneHeatmap};
