//! Event and heatmap sinks for the fast-break pipeline.
//!
//! This crate provides:
//! - `EventStore`: write-once persistence of fast-break events
//! - `HeatmapAggregator`: additive zone-visit counts per match
//! - In-memory and JSON-file implementations

pub mod error;
pub mod file;
pub mod memory;
pub mod sink;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileEventStore;
pub use memory::{MemoryEventStore, MemoryHeatmap};
pub use sink::{EventStore, HeatmapAggregator};
