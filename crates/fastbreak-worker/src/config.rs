//! Worker and analysis configuration from the environment.
//!
//! Worker settings fall back to defaults when unset or malformed. Analysis
//! thresholds do too, except the possession thresholds, which have no
//! default and must be supplied.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fastbreak_analysis::{AnalysisConfig, AttackDirection, PossessionConfig};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum matches analyzed concurrently
    pub max_concurrent_matches: usize,
    /// Per-frame detection source timeout
    pub frame_timeout: Duration,
    /// Consecutive detection timeouts before a match fails
    pub max_consecutive_timeouts: u32,
    /// Consecutive per-frame failures before a match fails
    pub max_consecutive_failures: u32,
    /// Frames between status publications
    pub status_batch_frames: u64,
    /// Directory event files are written to
    pub output_dir: PathBuf,
    /// Redis URL for the status store (in-memory when unset)
    pub redis_url: Option<String>,
    /// Address for the Prometheus exporter (disabled when unset)
    pub metrics_addr: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_matches: 4,
            frame_timeout: Duration::from_millis(2000),
            max_consecutive_timeouts: 10,
            max_consecutive_failures: 10,
            status_batch_frames: 25,
            output_dir: PathBuf::from("./fastbreak-events"),
            redis_url: None,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_matches: parse_or(&lookup, "WORKER_MAX_MATCHES", defaults.max_concurrent_matches)
                .max(1),
            frame_timeout: Duration::from_millis(parse_or(
                &lookup,
                "WORKER_FRAME_TIMEOUT_MS",
                defaults.frame_timeout.as_millis() as u64,
            )),
            max_consecutive_timeouts: parse_or(
                &lookup,
                "WORKER_MAX_CONSECUTIVE_TIMEOUTS",
                defaults.max_consecutive_timeouts,
            )
            .max(1),
            max_consecutive_failures: parse_or(
                &lookup,
                "WORKER_MAX_CONSECUTIVE_FAILURES",
                defaults.max_consecutive_failures,
            )
            .max(1),
            status_batch_frames: parse_or(&lookup, "WORKER_STATUS_BATCH_FRAMES", defaults.status_batch_frames)
                .max(1),
            output_dir: lookup("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            redis_url: lookup("REDIS_URL").filter(|s| !s.trim().is_empty()),
            metrics_addr: lookup("METRICS_ADDR").filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Build the analysis configuration from environment variables.
pub fn analysis_config_from_env() -> WorkerResult<AnalysisConfig> {
    analysis_config_from_lookup(|name| std::env::var(name).ok())
}

/// Build the analysis configuration from an arbitrary variable lookup.
pub fn analysis_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WorkerResult<AnalysisConfig> {
    let possession = PossessionConfig::new(
        required(&lookup, "FASTBREAK_PROXIMITY_PX")?,
        required(&lookup, "FASTBREAK_DEBOUNCE_FRAMES")?,
    );
    let mut config = AnalysisConfig::new(possession);

    let tracker = &mut config.tracker;
    tracker.min_confidence = parse_or(&lookup, "FASTBREAK_MIN_CONFIDENCE", tracker.min_confidence);
    tracker.gate_distance_px = parse_or(&lookup, "FASTBREAK_GATE_PX", tracker.gate_distance_px);
    tracker.max_staleness = parse_or(&lookup, "FASTBREAK_MAX_STALENESS", tracker.max_staleness);
    tracker.velocity_window = parse_or(&lookup, "FASTBREAK_VELOCITY_WINDOW", tracker.velocity_window);

    let grid = &mut config.grid;
    grid.pitch_width = parse_or(&lookup, "FASTBREAK_PITCH_WIDTH", grid.pitch_width);
    grid.pitch_height = parse_or(&lookup, "FASTBREAK_PITCH_HEIGHT", grid.pitch_height);
    grid.rows = parse_or(&lookup, "FASTBREAK_GRID_ROWS", grid.rows);
    grid.cols = parse_or(&lookup, "FASTBREAK_GRID_COLS", grid.cols);
    if let Some(attack) = lookup("FASTBREAK_ATTACK_DIRECTION") {
        grid.attack = AttackDirection::from_str(&attack)?;
    }

    let sequence = &mut config.sequence;
    sequence.max_gap_secs = parse_or(&lookup, "FASTBREAK_MAX_GAP_SECS", sequence.max_gap_secs);
    for (index, rule) in sequence.rules.rules.iter_mut().enumerate() {
        let prefix = format!("FASTBREAK_RULE{}", index + 1);
        rule.min_passes = parse_or(&lookup, &format!("{}_MIN_PASSES", prefix), rule.min_passes);
        rule.min_zone_sum_exclusive =
            parse_or(&lookup, &format!("{}_ZONE_SUM", prefix), rule.min_zone_sum_exclusive);
        if let Some(raw) = lookup(format!("{}_MAX_PASSES", prefix).as_str()) {
            rule.max_passes = parse_max_passes(&raw).unwrap_or(rule.max_passes);
        }
    }

    let scoring = &mut config.scoring;
    scoring.pass_weight = parse_or(&lookup, "FASTBREAK_WEIGHT_PASSES", scoring.pass_weight);
    scoring.zone_weight = parse_or(&lookup, "FASTBREAK_WEIGHT_ZONES", scoring.zone_weight);
    scoring.duration_weight = parse_or(&lookup, "FASTBREAK_WEIGHT_DURATION", scoring.duration_weight);
    scoring.velocity_weight = parse_or(&lookup, "FASTBREAK_WEIGHT_VELOCITY", scoring.velocity_weight);

    config.trajectory_capacity = parse_or(&lookup, "FASTBREAK_TRAJECTORY_CAPACITY", config.trajectory_capacity);
    config.kick_speed_px = parse_or(&lookup, "FASTBREAK_KICK_SPEED_PX", config.kick_speed_px);

    config.validate()?;
    Ok(config)
}

/// `none`/`unbounded` for no upper bound, otherwise a pass count.
fn parse_max_passes(raw: &str) -> Option<Option<u32>> {
    match raw.trim().to_lowercase().as_str() {
        "none" | "unbounded" | "" => Some(None),
        other => other.parse().ok().map(Some),
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn required<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> WorkerResult<T> {
    let raw = lookup(name).ok_or_else(|| WorkerError::config_error(format!("{} is required", name)))?;
    raw.trim()
        .parse()
        .map_err(|_| WorkerError::config_error(format!("{} has an invalid value '{}'", name, raw)))
}
