//! Ball possession assignment and debounced pass detection.
//!
//! Every frame the ball is assigned to the closest player within the
//! proximity threshold, to nobody (`Loose`, ball in flight) or to
//! `OutOfPlay` when its center leaves the pitch. Assignments go into a
//! sliding window of `debounce_frames`; a change of holder is committed
//! only when the whole window agrees, which suppresses single-frame
//! detector and tracker jitter.
//!
//! A committed change from holder A to holder B emits one pass, however
//! many loose frames separate the two. Committing `OutOfPlay` while
//! somebody holds the ball emits a possession loss (`to_player = None`).
//! The first holder after kickoff or a stoppage is established silently.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use fastbreak_models::{PossessionEvent, TrackedObject, Zone};

use crate::error::{AnalysisError, AnalysisResult};
use crate::zones::ZoneGrid;

/// Possession thresholds. There is deliberately no `Default`: both values
/// must be supplied by the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossessionConfig {
    /// Maximum ball-to-player center distance (pixels) for possession
    pub proximity_px: f64,
    /// Consecutive agreeing frames required to commit a new holder
    pub debounce_frames: usize,
}

impl PossessionConfig {
    pub fn new(proximity_px: f64, debounce_frames: usize) -> Self {
        Self {
            proximity_px,
            debounce_frames,
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.proximity_px.is_finite() && self.proximity_px > 0.0) {
            return Err(AnalysisError::invalid_config("proximity_px must be positive"));
        }
        if self.debounce_frames == 0 {
            return Err(AnalysisError::invalid_config("debounce_frames must be at least 1"));
        }
        Ok(())
    }
}

/// Who has the ball in a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Player(u64),
    Loose,
    OutOfPlay,
}

#[derive(Debug, Clone)]
struct Observation {
    frame_index: u64,
    timestamp: f64,
    assignment: Assignment,
    zone: Zone,
    /// `1 - distance / proximity` for player assignments, 1.0 otherwise
    closeness: f64,
}

/// Possession statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PossessionStats {
    pub passes: u64,
    pub losses: u64,
    pub frames_without_ball: u64,
}

/// Per-match possession analyzer.
pub struct PossessionAnalyzer {
    config: PossessionConfig,
    grid: ZoneGrid,
    window: VecDeque<Observation>,
    holder: Option<u64>,
    stats: PossessionStats,
}

impl PossessionAnalyzer {
    pub fn new(config: PossessionConfig, grid: ZoneGrid) -> Self {
        Self {
            window: VecDeque::with_capacity(config.debounce_frames),
            config,
            grid,
            holder: None,
            stats: PossessionStats::default(),
        }
    }

    /// Process one frame's tracked objects.
    ///
    /// Returns the possession event committed on this frame, if any.
    pub fn observe(
        &mut self,
        frame_index: u64,
        timestamp: f64,
        objects: &[TrackedObject],
    ) -> Option<PossessionEvent> {
        let Some(observation) = self.assign(frame_index, timestamp, objects) else {
            self.stats.frames_without_ball += 1;
            return None;
        };
        trace!(frame_index, assignment = ?observation.assignment, "Ball assignment");

        self.window.push_back(observation);
        while self.window.len() > self.config.debounce_frames {
            self.window.pop_front();
        }

        let candidate = self.unanimous()?;
        self.commit(candidate)
    }

    /// Classify the current frame. `None` when no ball is tracked.
    fn assign(&self, frame_index: u64, timestamp: f64, objects: &[TrackedObject]) -> Option<Observation> {
        let ball = select_ball(objects)?;
        let ball_center = ball.center();
        let zone = self.grid.clamped_zone_of(ball_center);

        if !self.grid.contains(ball_center.x, ball_center.y) {
            return Some(Observation {
                frame_index,
                timestamp,
                assignment: Assignment::OutOfPlay,
                zone,
                closeness: 1.0,
            });
        }

        let closest = objects
            .iter()
            .filter(|o| o.is_player())
            .map(|p| (p.id, p.center().distance(&ball_center)))
            .filter(|(_, d)| *d <= self.config.proximity_px)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let (assignment, closeness) = match closest {
            Some((id, distance)) => (
                Assignment::Player(id),
                (1.0 - distance / self.config.proximity_px).clamp(0.0, 1.0),
            ),
            None => (Assignment::Loose, 1.0),
        };

        Some(Observation {
            frame_index,
            timestamp,
            assignment,
            zone,
            closeness,
        })
    }

    /// The window's assignment if it is full and every entry agrees.
    fn unanimous(&self) -> Option<Assignment> {
        if self.window.len() < self.config.debounce_frames {
            return None;
        }
        let first = self.window.front()?.assignment;
        self.window
            .iter()
            .all(|o| o.assignment == first)
            .then_some(first)
    }

    fn commit(&mut self, candidate: Assignment) -> Option<PossessionEvent> {
        // The transfer moment is the oldest frame of the agreeing window
        let onset = self.window.front()?.clone();

        match candidate {
            Assignment::Player(id) if self.holder == Some(id) => None,
            Assignment::Player(id) => {
                let previous = self.holder.replace(id);
                match previous {
                    Some(from) => {
                        let confidence = self.window.iter().map(|o| o.closeness).sum::<f64>()
                            / self.window.len() as f64;
                        self.stats.passes += 1;
                        debug!(
                            from_player = from,
                            to_player = id,
                            zone = %onset.zone,
                            frame_index = onset.frame_index,
                            "Pass detected"
                        );
                        Some(PossessionEvent::pass(
                            onset.frame_index,
                            onset.timestamp,
                            from,
                            id,
                            onset.zone,
                            confidence,
                        ))
                    }
                    None => {
                        debug!(player = id, frame_index = onset.frame_index, "Possession established");
                        None
                    }
                }
            }
            Assignment::Loose => None,
            Assignment::OutOfPlay => {
                let from = self.holder.take()?;
                self.stats.losses += 1;
                debug!(
                    from_player = from,
                    frame_index = onset.frame_index,
                    "Ball out of play, possession lost"
                );
                Some(PossessionEvent::lost(onset.frame_index, onset.timestamp, from, onset.zone))
            }
        }
    }

    /// Earliest timestamp a pass committed from now on can carry: the
    /// oldest frame still in the debounce window.
    pub fn pending_since(&self) -> Option<f64> {
        self.window.front().map(|o| o.timestamp)
    }

    /// Player currently credited with possession.
    pub fn holder(&self) -> Option<u64> {
        self.holder
    }

    /// Forget the current holder and the debounce window.
    pub fn reset(&mut self) {
        self.window.clear();
        self.holder = None;
    }

    pub fn stats(&self) -> &PossessionStats {
        &self.stats
    }
}

/// The freshest ball: lowest staleness, then highest confidence, then
/// lowest id.
pub fn select_ball(objects: &[TrackedObject]) -> Option<&TrackedObject> {
    objects.iter().filter(|o| o.is_ball()).min_by(|a, b| {
        a.staleness
            .cmp(&b.staleness)
            .then(b.confidence.total_cmp(&a.confidence))
            .then(a.id.cmp(&b.id))
    })
}
