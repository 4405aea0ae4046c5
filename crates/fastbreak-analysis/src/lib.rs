//! Synchronous fast-break analysis core.
//!
//! Stages, leaves first:
//! - [`Tracker`]: raw detections to tracked objects with stable ids
//! - [`ZoneGrid`]: pixel coordinates to pitch zones
//! - [`PossessionAnalyzer`]: tracked objects to debounced passes
//! - [`SequenceEngine`]: passes to flagged fast-break sequences
//! - [`ConfidenceScorer`]: bounded score for a flagged sequence
//!
//! Every type here is owned by a single match; nothing is shared between
//! matches.

pub mod config;
pub mod error;
pub mod possession;
pub mod rules;
pub mod scoring;
pub mod sequence;
pub mod tracker;
pub mod trajectory;
pub mod zones;

pub use config::{AnalysisConfig, DEFAULT_TRAJECTORY_CAPACITY};
pub use error::{AnalysisError, AnalysisResult};
pub use possession::{select_ball, Assignment, PossessionAnalyzer, PossessionConfig, PossessionStats};
pub use rules::{FastBreakRule, RuleSet};
pub use scoring::{ConfidenceScorer, ScoreInputs, ScoringConfig};
pub use sequence::{EngineState, FlaggedSequence, ResetReason, SequenceConfig, SequenceEngine, SequenceStats};
pub use tracker::{Tracker, TrackerConfig, TrackerStats};
pub use trajectory::{average_speed, BallTrajectory, DEFAULT_KICK_SPEED_PX};
pub use zones::{AttackDirection, ZoneCell, ZoneGrid, ZoneGridConfig, ZoneLayout};
