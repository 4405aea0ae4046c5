//! Fast-break qualification rules.
//!
//! A sequence qualifies when its pass count falls inside a rule's range and
//! its zone sum is strictly greater than the rule's threshold. Rules are
//! evaluated in order; the first match names the event.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// One qualification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastBreakRule {
    /// Rule name stored with the event
    pub name: String,
    /// Minimum pass count (inclusive)
    pub min_passes: u32,
    /// Maximum pass count (inclusive), unbounded when `None`
    pub max_passes: Option<u32>,
    /// The zone sum must be strictly greater than this
    pub min_zone_sum_exclusive: u32,
}

impl FastBreakRule {
    pub fn new(name: impl Into<String>, min_passes: u32, max_passes: Option<u32>, min_zone_sum_exclusive: u32) -> Self {
        Self {
            name: name.into(),
            min_passes,
            max_passes,
            min_zone_sum_exclusive,
        }
    }

    pub fn matches(&self, pass_count: u32, zone_sum: u32) -> bool {
        let in_range = pass_count >= self.min_passes && self.max_passes.map_or(true, |max| pass_count <= max);
        in_range && zone_sum > self.min_zone_sum_exclusive
    }
}

/// Ordered set of qualification rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<FastBreakRule>,
}

impl Default for RuleSet {
    /// Three passes with zone sum above 9, or four to five passes with
    /// zone sum above 12.
    fn default() -> Self {
        Self {
            rules: vec![
                FastBreakRule::new("three_pass_break", 3, Some(3), 9),
                FastBreakRule::new("extended_break", 4, Some(5), 12),
            ],
        }
    }
}

impl RuleSet {
    pub fn new(rules: Vec<FastBreakRule>) -> Self {
        Self { rules }
    }

    /// First rule matched by the sequence totals.
    pub fn evaluate(&self, pass_count: u32, zone_sum: u32) -> Option<&FastBreakRule> {
        self.rules.iter().find(|r| r.matches(pass_count, zone_sum))
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.rules.is_empty() {
            return Err(AnalysisError::invalid_config("at least one fast-break rule is required"));
        }
        for rule in &self.rules {
            if rule.min_passes == 0 {
                return Err(AnalysisError::invalid_config(format!(
                    "rule '{}' must require at least one pass",
                    rule.name
                )));
            }
            if let Some(max) = rule.max_passes {
                if max < rule.min_passes {
                    return Err(AnalysisError::invalid_config(format!(
                        "rule '{}' has max_passes below min_passes",
                        rule.name
                    )));
                }
            }
        }
        Ok(())
    }
}
