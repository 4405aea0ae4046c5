//! Tracked objects as published by the tracker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, ObjectClass, Point};

/// Velocity in pixels per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// Speed magnitude in pixels per second.
    #[inline]
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// An object with a persistent identity across frames.
///
/// Owned by the tracker; downstream stages only ever see snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackedObject {
    /// Stable id, unique and monotonically increasing within a match
    pub id: u64,
    /// Object class
    pub class: ObjectClass,
    /// Last observed bounding box
    pub bbox: BoundingBox,
    /// Confidence of the last matched detection
    pub confidence: f64,
    /// Velocity estimated from recent matched observations
    pub velocity: Velocity,
    /// Frame index of the last matched detection
    pub last_seen_frame: u64,
    /// Consecutive frames without a matched detection
    pub staleness: u32,
}

impl TrackedObject {
    /// Center of the current bounding box.
    #[inline]
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    pub fn is_ball(&self) -> bool {
        self.class == ObjectClass::Ball
    }

    pub fn is_player(&self) -> bool {
        self.class == ObjectClass::Player
    }

    /// Whether the object was matched in the most recent frame.
    pub fn is_fresh(&self) -> bool {
        self.staleness == 0
    }
}
