//! Confidence scoring for flagged sequences.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::sequence::FlaggedSequence;

/// Weights and normalizers for the confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub pass_weight: f64,
    pub zone_weight: f64,
    pub duration_weight: f64,
    pub velocity_weight: f64,
    /// Pass count that earns the full pass factor
    pub pass_count_norm: f64,
    /// Zone sum that earns the full zone factor
    pub zone_sum_cap: f64,
    /// Duration (seconds) at which the shortness factor reaches zero
    pub duration_norm_secs: f64,
    /// Ball speed (pixels/second) that earns the full velocity factor
    pub velocity_norm: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pass_weight: 0.3,
            zone_weight: 0.3,
            duration_weight: 0.2,
            velocity_weight: 0.2,
            pass_count_norm: 5.0,
            zone_sum_cap: 54.0,
            duration_norm_secs: 10.0,
            velocity_norm: 1500.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> AnalysisResult<()> {
        let weights = [
            self.pass_weight,
            self.zone_weight,
            self.duration_weight,
            self.velocity_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::invalid_config("scoring weights must be non-negative"));
        }
        let norms = [
            self.pass_count_norm,
            self.zone_sum_cap,
            self.duration_norm_secs,
            self.velocity_norm,
        ];
        if norms.iter().any(|n| !n.is_finite() || *n <= 0.0) {
            return Err(AnalysisError::invalid_config("scoring normalizers must be positive"));
        }
        Ok(())
    }
}

/// Inputs to the score. Any factor may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub pass_count: Option<u32>,
    pub zone_sum: Option<u32>,
    pub duration_secs: Option<f64>,
    pub average_velocity: Option<f64>,
}

impl ScoreInputs {
    pub fn from_sequence(sequence: &FlaggedSequence, average_velocity: Option<f64>) -> Self {
        Self {
            pass_count: Some(sequence.pass_count),
            zone_sum: Some(sequence.zone_sum),
            duration_secs: Some(sequence.duration()),
            average_velocity,
        }
    }
}

/// Weighted, bounded confidence scorer. Never fails.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score in `[0, 1]`.
    pub fn score(&self, inputs: &ScoreInputs) -> f64 {
        let c = &self.config;

        let pass = inputs.pass_count.map(|n| ratio(f64::from(n), c.pass_count_norm));
        let zone = inputs.zone_sum.map(|s| ratio(f64::from(s), c.zone_sum_cap));
        // shorter breaks score higher
        let duration = inputs
            .duration_secs
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| 1.0 - ratio(d, c.duration_norm_secs));
        let velocity = inputs.average_velocity.map(|v| ratio(v, c.velocity_norm));

        let weighted = [
            (c.pass_weight, pass),
            (c.zone_weight, zone),
            (c.duration_weight, duration),
            (c.velocity_weight, velocity),
        ];

        let total_weight: f64 = weighted.iter().map(|(w, _)| sanitize(*w)).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }

        let sum: f64 = weighted
            .iter()
            .map(|(w, f)| sanitize(*w) * f.map(sanitize).unwrap_or(0.0))
            .sum();

        (sum / total_weight).clamp(0.0, 1.0)
    }

    pub fn score_sequence(&self, sequence: &FlaggedSequence, average_velocity: Option<f64>) -> f64 {
        self.score(&ScoreInputs::from_sequence(sequence, average_velocity))
    }
}

/// `min(value / norm, 1)`, or 0 for unusable input.
fn ratio(value: f64, norm: f64) -> f64 {
    if !value.is_finite() || value < 0.0 || !norm.is_finite() || norm <= 0.0 {
        return 0.0;
    }
    (value / norm).min(1.0)
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_inputs() -> ScoreInputs {
        ScoreInputs {
            pass_count: Some(3),
            zone_sum: Some(28),
            duration_secs: Some(2.0),
            average_velocity: Some(750.0),
        }
    }

    #[test]
    fn test_default_score() {
        let scorer = ConfidenceScorer::default();
        // 0.3*0.6 + 0.3*(28/54) + 0.2*0.8 + 0.2*0.5
        let expected = 0.18 + 0.3 * (28.0 / 54.0) + 0.16 + 0.1;
        assert!((scorer.score(&full_inputs()) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_factors_contribute_zero() {
        let scorer = ConfidenceScorer::default();
        let inputs = ScoreInputs {
            average_velocity: None,
            ..full_inputs()
        };
        let with_velocity = scorer.score(&full_inputs());
        let without = scorer.score(&inputs);
        assert!((with_velocity - without - 0.1).abs() < 1e-9);

        assert_eq!(scorer.score(&ScoreInputs::default()), 0.0);
    }

    #[test]
    fn test_non_finite_inputs_never_fail() {
        let scorer = ConfidenceScorer::default();
        let inputs = ScoreInputs {
            pass_count: Some(3),
            zone_sum: Some(28),
            duration_secs: Some(f64::NAN),
            average_velocity: Some(f64::INFINITY),
        };
        let score = scorer.score(&inputs);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - (0.18 + 0.3 * (28.0 / 54.0))).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = ConfidenceScorer::default();
        let inputs = ScoreInputs {
            pass_count: Some(50),
            zone_sum: Some(500),
            duration_secs: Some(0.0),
            average_velocity: Some(1e9),
        };
        assert_eq!(scorer.score(&inputs), 1.0);
    }

    #[test]
    fn test_zero_weights() {
        let scorer = ConfidenceScorer::new(ScoringConfig {
            pass_weight: 0.0,
            zone_weight: 0.0,
            duration_weight: 0.0,
            velocity_weight: 0.0,
            ..ScoringConfig::default()
        });
        assert_eq!(scorer.score(&full_inputs()), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(ScoringConfig::default().validate().is_ok());
        let bad = ScoringConfig {
            velocity_norm: 0.0,
            ..ScoringConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
