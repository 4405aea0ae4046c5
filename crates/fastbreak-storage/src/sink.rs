//! Storage collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;

use fastbreak_models::{FastBreakEvent, MatchId, ZoneHeatmap};

use crate::error::StorageResult;

/// Persists fast-break events keyed by match id.
///
/// A write either fully succeeds or leaves nothing visible; writing an
/// event id twice is rejected with `StorageError::AlreadyExists`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Store a single event.
    async fn write_event(&self, event: &FastBreakEvent) -> StorageResult<()>;

    /// All events stored for a match, ordered by start time.
    async fn list_events(&self, match_id: &MatchId) -> StorageResult<Vec<FastBreakEvent>>;
}

/// Accumulates zone-visit counts per match. Updates are additive.
#[async_trait]
pub trait HeatmapAggregator: Send + Sync {
    /// Add visit counts for a match.
    async fn add_visits(&self, match_id: &MatchId, visits: &ZoneHeatmap) -> StorageResult<()>;

    /// Current totals for a match (empty if none recorded).
    async fn heatmap(&self, match_id: &MatchId) -> StorageResult<ZoneHeatmap>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn write_event(&self, event: &FastBreakEvent) -> StorageResult<()> {
        (**self).write_event(event).await
    }

    async fn list_events(&self, match_id: &MatchId) -> StorageResult<Vec<FastBreakEvent>> {
        (**self).list_events(match_id).await
    }
}

#[async_trait]
impl<T: HeatmapAggregator + ?Sized> HeatmapAggregator for Arc<T> {
    async fn add_visits(&self, match_id: &MatchId, visits: &ZoneHeatmap) -> StorageResult<()> {
        (**self).add_visits(match_id, visits).await
    }

    async fn heatmap(&self, match_id: &MatchId) -> StorageResult<ZoneHeatmap> {
        (**self).heatmap(match_id).await
    }
}

/// Order events by start time, then sequence id.
pub(crate) fn sort_events(events: &mut [FastBreakEvent]) {
    events.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.sequence_id.cmp(&b.sequence_id))
    });
}
