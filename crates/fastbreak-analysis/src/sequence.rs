//! Pass-sequence state machine.
//!
//! One engine per match accumulates consecutive passes into a sequence and
//! evaluates the rule set after every append:
//!
//! ```text
//! IDLE --pass--> BUILDING --rule matched--> FLAGGED (emitted) --> IDLE
//!                    |
//!                    +--turnover / out of play / time gap--> RESET --> IDLE
//! ```
//!
//! `FLAGGED` and `RESET` are terminal for a sequence instance; the next pass
//! always opens a fresh one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fastbreak_models::{PossessionEvent, Zone};

use crate::error::{AnalysisError, AnalysisResult};
use crate::rules::RuleSet;

/// Sequence engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Maximum time between consecutive passes of one sequence (seconds)
    pub max_gap_secs: f64,
    /// Qualification rules, first match wins
    pub rules: RuleSet,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: 5.0,
            rules: RuleSet::default(),
        }
    }
}

impl SequenceConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.max_gap_secs.is_finite() && self.max_gap_secs > 0.0) {
            return Err(AnalysisError::invalid_config("max_gap_secs must be positive"));
        }
        self.rules.validate()
    }
}

/// Engine state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Building,
}

/// Why a sequence was dropped without being flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    /// Ball went back to a player who had already given it away
    Turnover,
    /// Ball left the pitch
    OutOfPlay,
    /// Too long since the last pass
    TimeGap,
    /// Dropped by the caller (cancellation or end of match)
    Discarded,
}

impl ResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetReason::Turnover => "turnover",
            ResetReason::OutOfPlay => "out_of_play",
            ResetReason::TimeGap => "time_gap",
            ResetReason::Discarded => "discarded",
        }
    }
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sequence that satisfied a rule. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedSequence {
    pub sequence_id: u64,
    /// Name of the matching rule
    pub rule: String,
    pub passes: Vec<PossessionEvent>,
    /// Zone of each pass, in order
    pub zones: Vec<Zone>,
    pub zone_sum: u32,
    pub pass_count: u32,
    pub start_time: f64,
    pub end_time: f64,
    /// Players in order of first touch
    pub player_ids: Vec<u64>,
}

impl FlaggedSequence {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A BUILDING sequence.
#[derive(Debug)]
struct Sequence {
    id: u64,
    passes: Vec<PossessionEvent>,
    zones: Vec<Zone>,
    zone_sum: u32,
    /// Players who have given the ball away in this sequence
    lost_by: HashSet<u64>,
    start_time: f64,
    last_time: f64,
}

impl Sequence {
    fn open(id: u64, timestamp: f64) -> Self {
        Self {
            id,
            passes: Vec::new(),
            zones: Vec::new(),
            zone_sum: 0,
            lost_by: HashSet::new(),
            start_time: timestamp,
            last_time: timestamp,
        }
    }

    fn append(&mut self, pass: PossessionEvent) {
        let zone = pass.zone();
        self.zone_sum += u32::from(zone.get());
        self.zones.push(zone);
        if let Some(from) = pass.from_player {
            self.lost_by.insert(from);
        }
        self.last_time = pass.timestamp;
        self.passes.push(pass);
    }

    fn pass_count(&self) -> u32 {
        self.passes.len() as u32
    }

    fn player_ids(&self) -> Vec<u64> {
        let mut seen = HashSet::new();
        self.passes
            .iter()
            .flat_map(|p| [p.from_player, p.to_player])
            .flatten()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn into_flagged(self, rule: &str) -> FlaggedSequence {
        let player_ids = self.player_ids();
        FlaggedSequence {
            sequence_id: self.id,
            rule: rule.to_string(),
            pass_count: self.pass_count(),
            zone_sum: self.zone_sum,
            start_time: self.start_time,
            end_time: self.last_time,
            zones: self.zones,
            passes: self.passes,
            player_ids,
        }
    }
}

/// Sequence engine statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub sequences_opened: u64,
    pub sequences_flagged: u64,
    pub reset_turnover: u64,
    pub reset_out_of_play: u64,
    pub reset_time_gap: u64,
    pub discarded: u64,
}

impl SequenceStats {
    /// Sequences dropped for any reason.
    pub fn total_resets(&self) -> u64 {
        self.reset_turnover + self.reset_out_of_play + self.reset_time_gap + self.discarded
    }

    fn record_reset(&mut self, reason: ResetReason) {
        match reason {
            ResetReason::Turnover => self.reset_turnover += 1,
            ResetReason::OutOfPlay => self.reset_out_of_play += 1,
            ResetReason::TimeGap => self.reset_time_gap += 1,
            ResetReason::Discarded => self.discarded += 1,
        }
    }
}

/// Per-match sequence engine. Events must arrive in timestamp order.
pub struct SequenceEngine {
    config: SequenceConfig,
    current: Option<Sequence>,
    next_sequence_id: u64,
    last_event_time: Option<f64>,
    stats: SequenceStats,
}

impl SequenceEngine {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            current: None,
            next_sequence_id: 1,
            last_event_time: None,
            stats: SequenceStats::default(),
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Feed one possession event.
    ///
    /// Returns the flagged sequence when this pass completes a fast break.
    /// Out-of-order or non-finite timestamps are rejected and leave the
    /// engine untouched.
    pub fn process(&mut self, event: &PossessionEvent) -> AnalysisResult<Option<FlaggedSequence>> {
        let timestamp = event.timestamp;
        if !timestamp.is_finite() {
            return Err(AnalysisError::InvalidTimestamp(timestamp));
        }
        if let Some(last) = self.last_event_time {
            if timestamp < last {
                return Err(AnalysisError::out_of_order(timestamp, last));
            }
        }
        self.last_event_time = Some(timestamp);

        let Some(to_player) = event.to_player else {
            self.reset(ResetReason::OutOfPlay);
            return Ok(None);
        };

        let broken = self.current.as_ref().and_then(|sequence| {
            if timestamp - sequence.last_time > self.config.max_gap_secs {
                Some(ResetReason::TimeGap)
            } else if sequence.lost_by.contains(&to_player) {
                Some(ResetReason::Turnover)
            } else {
                None
            }
        });
        if let Some(reason) = broken {
            self.reset(reason);
        }

        if self.current.is_none() {
            let id = self.next_sequence_id;
            self.next_sequence_id += 1;
            self.stats.sequences_opened += 1;
            debug!(sequence_id = id, start_time = timestamp, "Sequence opened");
            self.current = Some(Sequence::open(id, timestamp));
        }
        let Some(sequence) = self.current.as_mut() else {
            return Ok(None);
        };

        sequence.append(event.clone());
        let (pass_count, zone_sum) = (sequence.pass_count(), sequence.zone_sum);

        let Some(rule) = self.config.rules.evaluate(pass_count, zone_sum) else {
            return Ok(None);
        };
        let rule = rule.name.clone();
        let Some(sequence) = self.current.take() else {
            return Ok(None);
        };

        self.stats.sequences_flagged += 1;
        info!(
            sequence_id = sequence.id,
            rule = %rule,
            pass_count,
            zone_sum,
            "Fast break flagged"
        );
        Ok(Some(sequence.into_flagged(&rule)))
    }

    /// Apply the time-gap rule at `timestamp` without a new pass.
    ///
    /// Returns true if a BUILDING sequence was reset.
    pub fn advance_to(&mut self, timestamp: f64) -> bool {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|s| timestamp - s.last_time > self.config.max_gap_secs);
        if expired {
            self.reset(ResetReason::TimeGap);
        }
        expired
    }

    /// Drop the BUILDING sequence without emitting it.
    pub fn discard(&mut self) -> bool {
        self.reset(ResetReason::Discarded)
    }

    fn reset(&mut self, reason: ResetReason) -> bool {
        let Some(sequence) = self.current.take() else {
            return false;
        };
        self.stats.record_reset(reason);
        debug!(
            sequence_id = sequence.id,
            reason = %reason,
            pass_count = sequence.pass_count(),
            zone_sum = sequence.zone_sum,
            "Sequence reset"
        );
        true
    }

    pub fn state(&self) -> EngineState {
        if self.current.is_some() {
            EngineState::Building
        } else {
            EngineState::Idle
        }
    }

    /// (pass_count, zone_sum) of the BUILDING sequence.
    pub fn current_totals(&self) -> Option<(u32, u32)> {
        self.current.as_ref().map(|s| (s.pass_count(), s.zone_sum))
    }

    pub fn stats(&self) -> &SequenceStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(timestamp: f64, from: u64, to: u64, zone: u16) -> PossessionEvent {
        PossessionEvent::pass(
            (timestamp * 25.0) as u64,
            timestamp,
            from,
            to,
            Zone::new(zone).unwrap(),
            0.9,
        )
    }

    fn engine() -> SequenceEngine {
        SequenceEngine::new(SequenceConfig::default())
    }

    #[test]
    fn test_three_pass_fast_break() {
        let mut engine = engine();
        assert!(engine.process(&pass(1.0, 1, 2, 8)).unwrap().is_none());
        assert_eq!(engine.state(), EngineState::Building);
        assert!(engine.process(&pass(2.0, 2, 3, 9)).unwrap().is_none());
        let flagged = engine.process(&pass(3.0, 3, 4, 11)).unwrap().unwrap();

        assert_eq!(flagged.pass_count, 3);
        assert_eq!(flagged.zone_sum, 28);
        assert_eq!(flagged.start_time, 1.0);
        assert_eq!(flagged.end_time, 3.0);
        assert_eq!(flagged.duration(), 2.0);
        assert_eq!(flagged.rule, "three_pass_break");
        assert_eq!(flagged.player_ids, vec![1, 2, 3, 4]);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.stats().sequences_flagged, 1);
    }

    #[test]
    fn test_zone_sum_boundaries() {
        // 3 passes summing to exactly 9 stay BUILDING
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 3)).unwrap();
        engine.process(&pass(2.0, 2, 3, 3)).unwrap();
        assert!(engine.process(&pass(3.0, 3, 4, 3)).unwrap().is_none());
        assert_eq!(engine.current_totals(), Some((3, 9)));

        // a 4th pass reaching exactly 12 does not flag, 13 would
        let mut engine_12 = engine;
        assert!(engine_12.process(&pass(4.0, 4, 5, 3)).unwrap().is_none());
        assert_eq!(engine_12.current_totals(), Some((4, 12)));

        let mut engine = self::engine();
        engine.process(&pass(1.0, 1, 2, 3)).unwrap();
        engine.process(&pass(2.0, 2, 3, 3)).unwrap();
        engine.process(&pass(3.0, 3, 4, 3)).unwrap();
        let flagged = engine.process(&pass(4.0, 4, 5, 4)).unwrap().unwrap();
        assert_eq!(flagged.zone_sum, 13);
        assert_eq!(flagged.rule, "extended_break");
    }

    #[test]
    fn test_long_sequence_is_not_flagged() {
        let mut engine = engine();
        let zones = [1, 1, 1, 1, 1, 18];
        let mut flagged = None;
        for (i, zone) in zones.iter().enumerate() {
            let t = 1.0 + i as f64 * 0.5;
            flagged = engine.process(&pass(t, i as u64 + 1, i as u64 + 2, *zone)).unwrap();
        }
        assert!(flagged.is_none());
        assert_eq!(engine.current_totals(), Some((6, 23)));
    }

    #[test]
    fn test_time_gap_resets_and_restarts() {
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 8)).unwrap();
        engine.process(&pass(2.0, 2, 3, 9)).unwrap();
        // gap of 6s > 5s
        assert!(engine.process(&pass(8.0, 3, 4, 11)).unwrap().is_none());
        assert_eq!(engine.current_totals(), Some((1, 11)));
        assert_eq!(engine.stats().reset_time_gap, 1);
        assert_eq!(engine.stats().sequences_opened, 2);
    }

    #[test]
    fn test_advance_to_expires_sequence() {
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 8)).unwrap();
        assert!(!engine.advance_to(5.0));
        assert!(engine.advance_to(6.5));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_out_of_play_resets() {
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 8)).unwrap();
        engine.process(&pass(2.0, 2, 3, 9)).unwrap();
        let lost = PossessionEvent::lost(60, 2.5, 3, Zone::new(12).unwrap());
        assert!(engine.process(&lost).unwrap().is_none());
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.stats().reset_out_of_play, 1);

        // a loss while idle never opens a sequence
        engine.process(&PossessionEvent::lost(70, 2.8, 3, Zone::new(12).unwrap())).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.stats().sequences_opened, 1);
    }

    #[test]
    fn test_give_and_take_resets() {
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 8)).unwrap();
        engine.process(&pass(2.0, 2, 3, 9)).unwrap();
        // back to player 2, who already lost the ball
        assert!(engine.process(&pass(3.0, 3, 2, 11)).unwrap().is_none());
        assert_eq!(engine.stats().reset_turnover, 1);
        assert_eq!(engine.current_totals(), Some((1, 11)));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut engine = engine();
        engine.process(&pass(2.0, 1, 2, 8)).unwrap();
        let err = engine.process(&pass(1.0, 2, 3, 9)).unwrap_err();
        assert!(matches!(err, AnalysisError::OutOfOrder { .. }));
        assert_eq!(engine.current_totals(), Some((1, 8)));

        // equal timestamps are in order
        assert!(engine.process(&pass(2.0, 2, 3, 9)).is_ok());
    }

    #[test]
    fn test_discard_and_sequence_ids() {
        let mut engine = engine();
        engine.process(&pass(1.0, 1, 2, 8)).unwrap();
        assert!(engine.discard());
        assert!(!engine.discard());

        engine.process(&pass(2.0, 5, 6, 8)).unwrap();
        engine.process(&pass(3.0, 6, 7, 9)).unwrap();
        let flagged = engine.process(&pass(4.0, 7, 8, 11)).unwrap().unwrap();
        assert_eq!(flagged.sequence_id, 2);
        assert_eq!(engine.stats().total_resets(), 1);
    }
}
