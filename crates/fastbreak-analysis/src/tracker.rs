//! Nearest-neighbour multi-object tracker with occlusion bridging.
//!
//! Keeps a persistent identity for every player and ball across frames.
//!
//! # Per-frame update
//! 1. Drop detections below the confidence threshold
//! 2. Predict each object's center from its last observation and velocity
//! 3. Greedily match detections to objects of the same class, closest pairs
//!    first, within the gate distance
//! 4. Matched objects take the new box; unmatched objects age by one
//!    staleness tick; unmatched detections spawn new objects
//! 5. Objects whose staleness exceeds the limit are retired for good
//!
//! Ids increase monotonically and are never reused within a tracker's
//! lifetime (one tracker per match).
//!
//! # Usage
//! ```rust
//! use fastbreak_analysis::tracker::{Tracker, TrackerConfig};
//! use fastbreak_models::FrameRecord;
//!
//! let mut tracker = Tracker::new(TrackerConfig::default());
//! let objects = tracker.update(&FrameRecord::empty(0, 0.0)).unwrap();
//! assert!(objects.is_empty());
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use fastbreak_models::{BoundingBox, FrameRecord, Point, RawDetection, TrackedObject, Velocity};

use crate::error::{AnalysisError, AnalysisResult};

/// Configuration for tracker behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Detections below this confidence are ignored
    pub min_confidence: f64,
    /// Maximum center distance (pixels) for a detection to match an object
    pub gate_distance_px: f64,
    /// Consecutive missed frames tolerated before an object is retired
    pub max_staleness: u32,
    /// Number of matched observations used for velocity estimation
    pub velocity_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            gate_distance_px: 80.0,
            max_staleness: 30,
            velocity_window: 5,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AnalysisError::invalid_config("min_confidence must be within [0, 1]"));
        }
        if !(self.gate_distance_px.is_finite() && self.gate_distance_px > 0.0) {
            return Err(AnalysisError::invalid_config("gate_distance_px must be positive"));
        }
        if self.velocity_window < 2 {
            return Err(AnalysisError::invalid_config("velocity_window must be at least 2"));
        }
        Ok(())
    }
}

/// Internal per-object state.
#[derive(Debug, Clone)]
struct Track {
    object: TrackedObject,
    /// Recent matched centers with their timestamps, oldest first
    history: VecDeque<(f64, Point)>,
    /// Timestamp of the last matched detection
    last_observed_at: f64,
}

impl Track {
    fn new(id: u64, detection: &RawDetection, frame_index: u64, timestamp: f64) -> Self {
        let mut history = VecDeque::new();
        history.push_back((timestamp, detection.bbox.center()));

        Self {
            object: TrackedObject {
                id,
                class: detection.class,
                bbox: detection.bbox,
                confidence: detection.confidence,
                velocity: Velocity::default(),
                last_seen_frame: frame_index,
                staleness: 0,
            },
            history,
            last_observed_at: timestamp,
        }
    }

    /// Center extrapolated from the last observation at constant velocity.
    fn predicted_center(&self, timestamp: f64) -> Point {
        let dt = (timestamp - self.last_observed_at).max(0.0);
        let center = self.object.center();
        Point::new(
            center.x + self.object.velocity.vx * dt,
            center.y + self.object.velocity.vy * dt,
        )
    }

    fn observe(&mut self, detection: &RawDetection, frame_index: u64, timestamp: f64, window: usize) {
        self.history.push_back((timestamp, detection.bbox.center()));
        while self.history.len() > window {
            self.history.pop_front();
        }

        self.object.bbox = detection.bbox;
        self.object.confidence = detection.confidence;
        self.object.last_seen_frame = frame_index;
        self.object.staleness = 0;
        self.object.velocity = self.estimate_velocity();
        self.last_observed_at = timestamp;
    }

    fn estimate_velocity(&self) -> Velocity {
        match (self.history.front(), self.history.back()) {
            (Some((t0, p0)), Some((t1, p1))) if t1 - t0 > 0.0 => {
                let dt = t1 - t0;
                Velocity::new((p1.x - p0.x) / dt, (p1.y - p0.y) / dt)
            }
            _ => self.object.velocity,
        }
    }

    fn mark_missed(&mut self) {
        self.object.staleness = self.object.staleness.saturating_add(1);
    }

    fn should_retire(&self, config: &TrackerConfig) -> bool {
        self.object.staleness > config.max_staleness
    }
}

/// Tracker statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub active_objects: usize,
    pub total_spawned: u64,
    pub total_retired: u64,
    pub frames_processed: u64,
}

/// Per-match multi-object tracker.
pub struct Tracker {
    config: TrackerConfig,
    /// Active objects in creation order
    tracks: Vec<Track>,
    /// Next id to assign
    next_id: u64,
    /// Timestamp of the last processed frame
    last_timestamp: Option<f64>,
    total_spawned: u64,
    total_retired: u64,
    frames_processed: u64,
}

impl Tracker {
    /// Create a tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
            last_timestamp: None,
            total_spawned: 0,
            total_retired: 0,
            frames_processed: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Update with one frame of detections and return the current objects.
    ///
    /// A frame with no usable detections only ages existing objects.
    /// Frames must arrive in non-decreasing timestamp order.
    pub fn update(&mut self, frame: &FrameRecord) -> AnalysisResult<Vec<TrackedObject>> {
        if !frame.timestamp.is_finite() {
            return Err(AnalysisError::InvalidTimestamp(frame.timestamp));
        }
        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                return Err(AnalysisError::out_of_order(frame.timestamp, last));
            }
        }
        self.last_timestamp = Some(frame.timestamp);
        self.frames_processed += 1;

        let detections: Vec<&RawDetection> = frame
            .detections
            .iter()
            .filter(|d| d.confidence >= self.config.min_confidence && is_usable(&d.bbox))
            .collect();

        if detections.is_empty() {
            return Ok(self.age_all());
        }

        let (matches, unmatched_dets) = self.match_detections(&detections, frame.timestamp);

        let mut matched_tracks = vec![false; self.tracks.len()];
        for (track_idx, det_idx) in matches {
            matched_tracks[track_idx] = true;
            self.tracks[track_idx].observe(
                detections[det_idx],
                frame.frame_index,
                frame.timestamp,
                self.config.velocity_window,
            );
        }

        for (track, matched) in self.tracks.iter_mut().zip(&matched_tracks) {
            if !matched {
                track.mark_missed();
            }
        }

        for det_idx in unmatched_dets {
            let detection = detections[det_idx];
            let id = self.next_id;
            self.next_id += 1;
            self.total_spawned += 1;
            trace!(
                track_id = id,
                class = %detection.class,
                frame_index = frame.frame_index,
                "No object within gate, spawning new track"
            );
            self.tracks
                .push(Track::new(id, detection, frame.frame_index, frame.timestamp));
        }

        self.retire_stale();
        Ok(self.snapshot())
    }

    /// Age every object by one frame without new detections.
    ///
    /// Used when the detection source produced nothing for a frame (for
    /// example after a timeout).
    pub fn tick(&mut self) -> Vec<TrackedObject> {
        self.frames_processed += 1;
        self.age_all()
    }

    fn age_all(&mut self) -> Vec<TrackedObject> {
        for track in &mut self.tracks {
            track.mark_missed();
        }
        self.retire_stale();
        self.snapshot()
    }

    fn retire_stale(&mut self) {
        let config = &self.config;
        let before = self.tracks.len();
        self.tracks.retain(|t| {
            let retire = t.should_retire(config);
            if retire {
                debug!(
                    track_id = t.object.id,
                    class = %t.object.class,
                    staleness = t.object.staleness,
                    "Retiring stale track"
                );
            }
            !retire
        });
        self.total_retired += (before - self.tracks.len()) as u64;
    }

    /// Greedy nearest-neighbour assignment.
    ///
    /// Returns `(track_idx, det_idx)` pairs and the unmatched detection
    /// indices. Ties are broken by object id, then detection index.
    fn match_detections(
        &self,
        detections: &[&RawDetection],
        timestamp: f64,
    ) -> (Vec<(usize, usize)>, Vec<usize>) {
        let mut candidates: Vec<(f64, u64, usize, usize)> = Vec::new();
        for (track_idx, track) in self.tracks.iter().enumerate() {
            let predicted = track.predicted_center(timestamp);
            for (det_idx, det) in detections.iter().enumerate() {
                if det.class != track.object.class {
                    continue;
                }
                let distance = predicted.distance(&det.bbox.center());
                if distance <= self.config.gate_distance_px {
                    candidates.push((distance, track.object.id, det_idx, track_idx));
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut matches = Vec::new();
        let mut matched_tracks = vec![false; self.tracks.len()];
        let mut matched_dets = vec![false; detections.len()];

        for (_distance, _id, det_idx, track_idx) in candidates {
            if !matched_tracks[track_idx] && !matched_dets[det_idx] {
                matches.push((track_idx, det_idx));
                matched_tracks[track_idx] = true;
                matched_dets[det_idx] = true;
            }
        }

        let unmatched_dets = (0..detections.len()).filter(|&i| !matched_dets[i]).collect();
        (matches, unmatched_dets)
    }

    /// Snapshot of all active objects.
    pub fn snapshot(&self) -> Vec<TrackedObject> {
        self.tracks.iter().map(|t| t.object.clone()).collect()
    }

    /// Get object by id.
    pub fn object_by_id(&self, id: u64) -> Option<&TrackedObject> {
        self.tracks.iter().map(|t| &t.object).find(|o| o.id == id)
    }

    /// Get number of active objects.
    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    /// Drop every active object. Id allocation continues where it left
    /// off, so retired ids are never handed out again.
    pub fn reset(&mut self) {
        debug!(objects_cleared = self.tracks.len(), "Tracker reset");
        self.total_retired += self.tracks.len() as u64;
        self.tracks.clear();
        self.last_timestamp = None;
    }

    /// Get statistics.
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            active_objects: self.tracks.len(),
            total_spawned: self.total_spawned,
            total_retired: self.total_retired,
            frames_processed: self.frames_processed,
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

fn is_usable(bbox: &BoundingBox) -> bool {
    bbox.x.is_finite()
        && bbox.y.is_finite()
        && bbox.width.is_finite()
        && bbox.height.is_finite()
        && bbox.width >= 0.0
        && bbox.height >= 0.0
}
