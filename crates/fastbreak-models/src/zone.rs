//! Pitch zones and zone-visit aggregates.
//!
//! A zone is one cell of the grid overlaid on the pitch image, numbered
//! from 1 left-to-right, top-to-bottom. The grid geometry itself lives in
//! the analysis crate; this type only carries the number.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a zone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("Zone numbers start at 1, got 0")]
    Zero,
}

/// A 1-based pitch zone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Zone(u16);

impl Zone {
    /// Create a zone from its 1-based number.
    pub fn new(number: u16) -> Result<Self, ZoneError> {
        if number == 0 {
            return Err(ZoneError::Zero);
        }
        Ok(Self(number))
    }

    /// Create a zone from a 0-based grid index.
    pub fn from_index(index: u16) -> Self {
        Self(index.saturating_add(1))
    }

    /// The 1-based zone number.
    #[inline]
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Zone {
    type Error = ZoneError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Zone::new(value)
    }
}

/// Additive zone-visit counts, used for zone-density rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ZoneHeatmap {
    counts: BTreeMap<Zone, u64>,
}

impl ZoneHeatmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a heatmap from a list of visited zones.
    pub fn from_zones<'a>(zones: impl IntoIterator<Item = &'a Zone>) -> Self {
        let mut heatmap = Self::new();
        for zone in zones {
            heatmap.record(*zone);
        }
        heatmap
    }

    /// Record one visit to a zone.
    pub fn record(&mut self, zone: Zone) {
        *self.counts.entry(zone).or_insert(0) += 1;
    }

    /// Add all counts from another heatmap.
    pub fn merge(&mut self, other: &ZoneHeatmap) {
        for (zone, count) in &other.counts {
            *self.counts.entry(*zone).or_insert(0) += count;
        }
    }

    /// Visit count for a zone (0 if never visited).
    pub fn count(&self, zone: Zone) -> u64 {
        self.counts.get(&zone).copied().unwrap_or(0)
    }

    /// Total visits across all zones.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over (zone, count) pairs in zone order.
    pub fn iter(&self) -> impl Iterator<Item = (Zone, u64)> + '_ {
        self.counts.iter().map(|(z, c)| (*z, *c))
    }
}
