//! Possession transfers ("passes").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Zone;

/// A confirmed change of ball possession.
///
/// `to_player` is `None` when possession was lost because the ball left
/// the pitch. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PossessionEvent {
    /// Frame at which the transfer happened
    pub frame_index: u64,
    /// Timestamp of the transfer in seconds
    pub timestamp: f64,
    /// Player who lost the ball
    pub from_player: Option<u64>,
    /// Player who received the ball
    pub to_player: Option<u64>,
    /// Ball zone at the moment of transfer
    pub from_zone: Zone,
    /// Ball zone at the moment of transfer
    pub to_zone: Zone,
    /// Confidence of the ball-to-player association (0.0-1.0)
    pub confidence: f64,
}

impl PossessionEvent {
    /// Create a pass between two players.
    pub fn pass(frame_index: u64, timestamp: f64, from: u64, to: u64, zone: Zone, confidence: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            from_player: Some(from),
            to_player: Some(to),
            from_zone: zone,
            to_zone: zone,
            confidence,
        }
    }

    /// Create a possession loss (ball out of play).
    pub fn lost(frame_index: u64, timestamp: f64, from: u64, zone: Zone) -> Self {
        Self {
            frame_index,
            timestamp,
            from_player: Some(from),
            to_player: None,
            from_zone: zone,
            to_zone: zone,
            confidence: 1.0,
        }
    }

    /// Whether this event ends possession rather than transferring it.
    pub fn is_loss(&self) -> bool {
        self.to_player.is_none()
    }

    /// Zone this pass contributes to a sequence's zone sum.
    #[inline]
    pub fn zone(&self) -> Zone {
        self.to_zone
    }
}
