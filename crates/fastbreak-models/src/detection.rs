//! Raw detector output, one record per processed video frame.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Object class produced by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Player,
    Ball,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Player => "player",
            ObjectClass::Ball => "ball",
        }
    }
}

impl std::fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detection within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    /// Bounding box in pixel coordinates
    pub bbox: BoundingBox,
    /// Detected class
    pub class: ObjectClass,
    /// Detector confidence (0.0-1.0)
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, class: ObjectClass, confidence: f64) -> Self {
        Self {
            bbox,
            class,
            confidence,
        }
    }
}

/// All detections for one frame, as delivered by the Detection Source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRecord {
    /// Index of the frame in the source video
    pub frame_index: u64,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
    /// Detections in this frame (may be empty)
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl FrameRecord {
    /// Create a new frame record.
    pub fn new(frame_index: u64, timestamp: f64, detections: Vec<RawDetection>) -> Self {
        Self {
            frame_index,
            timestamp,
            detections,
        }
    }

    /// Create a frame with no detections.
    pub fn empty(frame_index: u64, timestamp: f64) -> Self {
        Self::new(frame_index, timestamp, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
