//! In-memory sinks, used by tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use fastbreak_models::{FastBreakEvent, MatchId, ZoneHeatmap};

use crate::error::{StorageError, StorageResult};
use crate::sink::{sort_events, EventStore, HeatmapAggregator};

/// Event store backed by a map of match id to events.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<MatchId, Vec<FastBreakEvent>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events stored across all matches.
    pub async fn len(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn write_event(&self, event: &FastBreakEvent) -> StorageResult<()> {
        let mut events = self.events.write().await;
        let match_events = events.entry(event.match_id.clone()).or_default();
        if match_events.iter().any(|e| e.id == event.id) {
            return Err(StorageError::already_exists(&event.id));
        }
        match_events.push(event.clone());
        debug!(match_id = %event.match_id, event_id = %event.id, "Stored event in memory");
        Ok(())
    }

    async fn list_events(&self, match_id: &MatchId) -> StorageResult<Vec<FastBreakEvent>> {
        let mut events = self
            .events
            .read()
            .await
            .get(match_id)
            .cloned()
            .unwrap_or_default();
        sort_events(&mut events);
        Ok(events)
    }
}

/// Heatmap aggregator backed by a map of match id to counts.
#[derive(Debug, Default)]
pub struct MemoryHeatmap {
    heatmaps: RwLock<HashMap<MatchId, ZoneHeatmap>>,
}

impl MemoryHeatmap {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeatmapAggregator for MemoryHeatmap {
    async fn add_visits(&self, match_id: &MatchId, visits: &ZoneHeatmap) -> StorageResult<()> {
        self.heatmaps
            .write()
            .await
            .entry(match_id.clone())
            .or_default()
            .merge(visits);
        Ok(())
    }

    async fn heatmap(&self, match_id: &MatchId) -> StorageResult<ZoneHeatmap> {
        Ok(self
            .heatmaps
            .read()
            .await
            .get(match_id)
            .cloned()
            .unwrap_or_default())
    }
}
