//! Event emission.
//!
//! Packages flagged sequences into fast-break events and hands them to the
//! storage collaborators. Emission is at-most-once per sequence id and
//! never touches sequence engine state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use fastbreak_analysis::{average_speed, BallTrajectory, ConfidenceScorer, FlaggedSequence};
use fastbreak_models::{FastBreakEvent, FastBreakEventData, MatchId, ZoneHeatmap, FAST_BREAK_EVENT_TYPE};
use fastbreak_storage::{EventStore, HeatmapAggregator};

use crate::error::WorkerResult;
use crate::metrics;

/// Emits fast-break events for one match.
pub struct FastBreakEmitter {
    match_id: MatchId,
    events: Arc<dyn EventStore>,
    heatmap: Arc<dyn HeatmapAggregator>,
    scorer: ConfidenceScorer,
    emitted: HashSet<u64>,
}

impl FastBreakEmitter {
    pub fn new(
        match_id: MatchId,
        events: Arc<dyn EventStore>,
        heatmap: Arc<dyn HeatmapAggregator>,
        scorer: ConfidenceScorer,
    ) -> Self {
        Self {
            match_id,
            events,
            heatmap,
            scorer,
            emitted: HashSet::new(),
        }
    }

    /// Build the event for a flagged sequence without writing it.
    pub fn build_event(&self, flagged: &FlaggedSequence, trajectory: &BallTrajectory) -> FastBreakEvent {
        let ball_trajectory = trajectory.samples_between(flagged.start_time, flagged.end_time);
        let average_velocity = average_speed(&ball_trajectory);
        let confidence_score = self.scorer.score_sequence(flagged, average_velocity);

        FastBreakEvent {
            id: FastBreakEvent::new_id(),
            match_id: self.match_id.clone(),
            event_type: FAST_BREAK_EVENT_TYPE.to_string(),
            rule: flagged.rule.clone(),
            sequence_id: flagged.sequence_id,
            start_time: flagged.start_time,
            end_time: flagged.end_time,
            duration: flagged.duration(),
            zone_sum: flagged.zone_sum,
            pass_count: flagged.pass_count,
            confidence_score,
            event_data: FastBreakEventData {
                passes: flagged.passes.clone(),
                ball_trajectory,
                player_ids: flagged.player_ids.clone(),
                zones_touched: flagged.zones.clone(),
                kicks: trajectory.kicks_between(flagged.start_time, flagged.end_time),
                average_velocity,
            },
            created_at: Utc::now(),
        }
    }

    /// Write the event for a flagged sequence, then record its zone visits.
    ///
    /// Returns `Ok(None)` if this sequence was already emitted. A storage
    /// failure is returned to the caller; the sequence is not retried.
    pub async fn emit(
        &mut self,
        flagged: &FlaggedSequence,
        trajectory: &BallTrajectory,
    ) -> WorkerResult<Option<FastBreakEvent>> {
        if !self.emitted.insert(flagged.sequence_id) {
            debug!(
                match_id = %self.match_id,
                sequence_id = flagged.sequence_id,
                "Sequence already emitted, skipping"
            );
            return Ok(None);
        }

        let event = self.build_event(flagged, trajectory);

        if let Err(e) = self.events.write_event(&event).await {
            metrics::record_storage_failure("events");
            error!(
                match_id = %self.match_id,
                sequence_id = flagged.sequence_id,
                error = %e,
                "Failed to store fast-break event"
            );
            return Err(e.into());
        }

        let visits = ZoneHeatmap::from_zones(&flagged.zones);
        if let Err(e) = self.heatmap.add_visits(&self.match_id, &visits).await {
            metrics::record_storage_failure("heatmap");
            warn!(
                match_id = %self.match_id,
                sequence_id = flagged.sequence_id,
                error = %e,
                "Failed to update zone heatmap"
            );
        }

        metrics::record_fast_break(&event.rule);
        info!(
            match_id = %self.match_id,
            event_id = %event.id,
            sequence_id = event.sequence_id,
            rule = %event.rule,
            pass_count = event.pass_count,
            zone_sum = event.zone_sum,
            confidence = event.confidence_score,
            "Fast break emitted"
        );
        Ok(Some(event))
    }

    /// Number of sequences emission was attempted for.
    pub fn emitted_count(&self) -> usize {
        self.emitted.len()
    }
}
