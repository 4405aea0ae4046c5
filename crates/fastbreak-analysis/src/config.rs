//! Combined analysis configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::possession::PossessionConfig;
use crate::scoring::ScoringConfig;
use crate::sequence::SequenceConfig;
use crate::tracker::TrackerConfig;
use crate::trajectory::DEFAULT_KICK_SPEED_PX;
use crate::zones::ZoneGridConfig;

/// Default number of ball samples kept per match (30 s at 25 fps).
pub const DEFAULT_TRAJECTORY_CAPACITY: usize = 750;

/// Every threshold used by one match's analysis.
///
/// There is no `Default` because possession thresholds must be supplied;
/// use [`AnalysisConfig::new`] to take defaults for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub tracker: TrackerConfig,
    pub grid: ZoneGridConfig,
    pub possession: PossessionConfig,
    pub sequence: SequenceConfig,
    pub scoring: ScoringConfig,
    pub trajectory_capacity: usize,
    /// Ball speed (pixels/second) above which a kick is recorded
    pub kick_speed_px: f64,
}

impl AnalysisConfig {
    pub fn new(possession: PossessionConfig) -> Self {
        Self {
            tracker: TrackerConfig::default(),
            grid: ZoneGridConfig::default(),
            possession,
            sequence: SequenceConfig::default(),
            scoring: ScoringConfig::default(),
            trajectory_capacity: DEFAULT_TRAJECTORY_CAPACITY,
            kick_speed_px: DEFAULT_KICK_SPEED_PX,
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        self.tracker.validate()?;
        self.grid.validate()?;
        self.possession.validate()?;
        self.sequence.validate()?;
        self.scoring.validate()?;
        if self.trajectory_capacity == 0 {
            return Err(AnalysisError::invalid_config("trajectory_capacity must be at least 1"));
        }
        if !(self.kick_speed_px.is_finite() && self.kick_speed_px > 0.0) {
            return Err(AnalysisError::invalid_config("kick_speed_px must be positive"));
        }
        Ok(())
    }
}
