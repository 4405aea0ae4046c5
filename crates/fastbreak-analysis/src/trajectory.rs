//! Bounded history of observed ball positions and kicks.
//!
//! A kick is recorded when the ball's speed rises above the kick threshold.
//! It stays one kick for as long as the same ball keeps moving that fast.

use std::collections::VecDeque;

use tracing::trace;

use fastbreak_models::{BallKick, Point, TrackedObject, TrajectorySample};

use crate::zones::ZoneGrid;

/// Default kick threshold in pixels per second (10 px/frame at 25 fps).
pub const DEFAULT_KICK_SPEED_PX: f64 = 250.0;

/// Ring buffer of ball samples and kicks, oldest first.
#[derive(Debug, Clone)]
pub struct BallTrajectory {
    samples: VecDeque<TrajectorySample>,
    kicks: VecDeque<BallKick>,
    capacity: usize,
    kick_speed_px: f64,
    /// Ball currently above the kick threshold
    kicking: Option<u64>,
}

impl BallTrajectory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(4096)),
            kicks: VecDeque::new(),
            capacity: capacity.max(1),
            kick_speed_px: DEFAULT_KICK_SPEED_PX,
            kicking: None,
        }
    }

    /// Set the speed (pixels/second) above which the ball counts as kicked.
    pub fn with_kick_speed(mut self, kick_speed_px: f64) -> Self {
        self.kick_speed_px = kick_speed_px;
        self
    }

    /// Record the ball position for a frame. Only freshly matched balls are
    /// recorded; predicted positions are not observations.
    pub fn record(&mut self, ball: &TrackedObject, frame_index: u64, timestamp: f64, grid: &ZoneGrid) {
        if !ball.is_fresh() {
            return;
        }
        let center = ball.center();
        self.detect_kick(ball, frame_index, timestamp, center);
        self.push(TrajectorySample {
            frame_index,
            timestamp,
            x: center.x,
            y: center.y,
            zone: grid.clamped_zone_of(center),
        });
    }

    fn detect_kick(&mut self, ball: &TrackedObject, frame_index: u64, timestamp: f64, center: Point) {
        let speed = ball.velocity.speed();
        if speed.is_nan() || speed <= self.kick_speed_px {
            self.kicking = None;
            return;
        }
        if self.kicking == Some(ball.id) {
            return;
        }
        self.kicking = Some(ball.id);

        trace!(frame_index, ball_id = ball.id, speed, "Ball kick");
        if self.kicks.len() == self.capacity {
            self.kicks.pop_front();
        }
        self.kicks.push_back(BallKick {
            frame_index,
            timestamp,
            ball_id: ball.id,
            x: center.x,
            y: center.y,
            velocity: ball.velocity,
            speed,
        });
    }

    pub fn push(&mut self, sample: TrajectorySample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples with `start <= timestamp <= end`, in order.
    pub fn samples_between(&self, start: f64, end: f64) -> Vec<TrajectorySample> {
        self.samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .copied()
            .collect()
    }

    /// Kicks with `start <= timestamp <= end`, in order.
    pub fn kicks_between(&self, start: f64, end: f64) -> Vec<BallKick> {
        self.kicks
            .iter()
            .filter(|k| k.timestamp >= start && k.timestamp <= end)
            .copied()
            .collect()
    }

    /// Every kick still held, oldest first.
    pub fn kicks(&self) -> impl Iterator<Item = &BallKick> {
        self.kicks.iter()
    }

    /// Linear extrapolation of the ball position from the last three
    /// samples. `None` with fewer than three samples.
    pub fn predict_position(&self, seconds_ahead: f64) -> Option<Point> {
        if self.samples.len() < 3 {
            return None;
        }
        let recent: Vec<&TrajectorySample> = self.samples.iter().rev().take(3).collect();
        let (newest, oldest) = (recent[0], recent[2]);
        let dt = newest.timestamp - oldest.timestamp;
        if dt <= 0.0 {
            return Some(Point::new(newest.x, newest.y));
        }
        let vx = (newest.x - oldest.x) / dt;
        let vy = (newest.y - oldest.y) / dt;
        Some(Point::new(newest.x + vx * seconds_ahead, newest.y + vy * seconds_ahead))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.kicks.clear();
        self.kicking = None;
    }
}

/// Mean ball speed (pixels/second) over consecutive samples.
///
/// `None` when fewer than two samples span a positive time interval.
pub fn average_speed(samples: &[TrajectorySample]) -> Option<f64> {
    let mut distance = 0.0;
    let mut elapsed = 0.0;
    for pair in samples.windows(2) {
        let dt = pair[1].timestamp - pair[0].timestamp;
        if dt <= 0.0 {
            continue;
        }
        distance += Point::new(pair[0].x, pair[0].y).distance(&Point::new(pair[1].x, pair[1].y));
        elapsed += dt;
    }
    if elapsed > 0.0 {
        Some(distance / elapsed)
    } else {
        None
    }
}
