//! Per-match analysis pipeline.
//!
//! Detection source -> tracker -> possession analyzer -> sequence engine
//! -> emitter, strictly sequential within one match. Every stage is owned
//! by the pipeline; nothing is shared with other matches except the
//! thread-safe sinks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn, Instrument};

use fastbreak_analysis::{
    select_ball, AnalysisConfig, BallTrajectory, ConfidenceScorer, PossessionAnalyzer, SequenceEngine, Tracker,
    ZoneGrid,
};
use fastbreak_jobs::StatusStore;
use fastbreak_models::{FastBreakEvent, FrameRecord, MatchId, MatchStatus, MatchStatusCache, TrackedObject};
use fastbreak_storage::{EventStore, HeatmapAggregator};

use crate::config::WorkerConfig;
use crate::emitter::FastBreakEmitter;
use crate::error::{SourceError, WorkerError, WorkerResult};
use crate::logging::MatchLogger;
use crate::metrics;
use crate::source::DetectionSource;

/// Loop limits for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub frame_timeout: Duration,
    pub max_consecutive_timeouts: u32,
    pub max_consecutive_failures: u32,
    pub status_batch_frames: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        WorkerConfig::default().pipeline_settings()
    }
}

impl WorkerConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            frame_timeout: self.frame_timeout,
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            max_consecutive_failures: self.max_consecutive_failures,
            status_batch_frames: self.status_batch_frames,
        }
    }
}

/// External collaborators shared by every pipeline.
#[derive(Clone)]
pub struct PipelineSinks {
    pub events: Arc<dyn EventStore>,
    pub heatmap: Arc<dyn HeatmapAggregator>,
    pub status: Arc<dyn StatusStore>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub frames_processed: u64,
    pub events: Vec<FastBreakEvent>,
    pub passes: u64,
    pub timeouts: u64,
    pub frame_failures: u64,
    pub storage_failures: u64,
    /// Cause of failure, when `status` is failed
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            status: MatchStatus::Queued,
            frames_processed: 0,
            events: Vec::new(),
            passes: 0,
            timeouts: 0,
            frame_failures: 0,
            storage_failures: 0,
            error: None,
        }
    }

    /// Outcome for a match that stopped before any frame was read.
    pub(crate) fn stopped(match_id: MatchId, status: MatchStatus, error: Option<String>) -> Self {
        Self {
            status,
            error,
            ..Self::new(match_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MatchStatus::Completed
    }
}

/// Why the frame loop stopped.
enum Stop {
    Exhausted,
    Cancelled,
    Failed(String),
}

/// Everything one match needs, owned by that match's task.
pub struct MatchPipeline {
    match_id: MatchId,
    settings: PipelineSettings,
    grid: ZoneGrid,
    tracker: Tracker,
    possession: PossessionAnalyzer,
    engine: SequenceEngine,
    trajectory: BallTrajectory,
    emitter: FastBreakEmitter,
    status_store: Arc<dyn StatusStore>,
    status: MatchStatusCache,
    logger: MatchLogger,
    outcome: PipelineOutcome,
}

impl MatchPipeline {
    pub fn new(
        match_id: MatchId,
        config: &AnalysisConfig,
        settings: PipelineSettings,
        sinks: PipelineSinks,
    ) -> WorkerResult<Self> {
        config.validate()?;
        let grid = ZoneGrid::new(config.grid.clone())?;

        Ok(Self {
            tracker: Tracker::new(config.tracker.clone()),
            possession: PossessionAnalyzer::new(config.possession.clone(), grid.clone()),
            engine: SequenceEngine::new(config.sequence.clone()),
            trajectory: BallTrajectory::new(config.trajectory_capacity).with_kick_speed(config.kick_speed_px),
            emitter: FastBreakEmitter::new(
                match_id.clone(),
                sinks.events,
                sinks.heatmap,
                ConfidenceScorer::new(config.scoring.clone()),
            ),
            status_store: sinks.status,
            status: MatchStatusCache::new(match_id.clone()),
            logger: MatchLogger::new(&match_id, "fast_break_analysis"),
            outcome: PipelineOutcome::new(match_id.clone()),
            match_id,
            settings,
            grid,
        })
    }

    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Run the pipeline until the source is exhausted, the match is
    /// cancelled, or failures exceed their limits.
    pub async fn run<S>(self, source: &mut S, cancel: watch::Receiver<bool>) -> PipelineOutcome
    where
        S: DetectionSource + ?Sized,
    {
        let span = self.logger.create_span();
        self.run_inner(source, cancel).instrument(span).await
    }

    async fn run_inner<S>(mut self, source: &mut S, mut cancel: watch::Receiver<bool>) -> PipelineOutcome
    where
        S: DetectionSource + ?Sized,
    {
        let total = source.total_frames();
        self.logger
            .log_start(&format!("total_frames={}", total.map_or("unknown".to_string(), |t| t.to_string())));
        self.status.start(total);
        self.publish_status().await;

        let mut consecutive_timeouts = 0u32;
        let mut consecutive_failures = 0u32;
        let mut last_published = 0u64;

        let stop = loop {
            if *cancel.borrow() {
                break Stop::Cancelled;
            }

            let next = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => break Stop::Cancelled,
                next = tokio::time::timeout(self.settings.frame_timeout, source.next_frame()) => next,
            };

            match next {
                Err(_elapsed) => {
                    consecutive_timeouts += 1;
                    self.outcome.timeouts += 1;
                    metrics::record_detection_timeout();
                    self.logger.log_frame_warning(
                        None,
                        &format!(
                            "detection timed out after {:?} ({} consecutive)",
                            self.settings.frame_timeout, consecutive_timeouts
                        ),
                    );
                    self.tracker.tick();
                    if consecutive_timeouts >= self.settings.max_consecutive_timeouts {
                        break Stop::Failed(format!(
                            "{} consecutive detection timeouts",
                            consecutive_timeouts
                        ));
                    }
                    continue;
                }
                Ok(Ok(None)) => break Stop::Exhausted,
                Ok(Ok(Some(frame))) => {
                    consecutive_timeouts = 0;
                    match self.process_frame(&frame).await {
                        Ok(()) => consecutive_failures = 0,
                        Err(e) => {
                            consecutive_failures += 1;
                            if let Some(stop) =
                                self.frame_failed(Some(frame.frame_index), "analysis", &e, consecutive_failures)
                            {
                                break stop;
                            }
                        }
                    }
                    self.outcome.frames_processed += 1;
                }
                Ok(Err(e)) => {
                    consecutive_timeouts = 0;
                    consecutive_failures += 1;
                    let e = WorkerError::from(e);
                    if let Some(stop) = self.frame_failed(None, source_failure_kind(&e), &e, consecutive_failures) {
                        break stop;
                    }
                }
            }

            if self.outcome.frames_processed - last_published >= self.settings.status_batch_frames {
                last_published = self.outcome.frames_processed;
                self.status.record_frames(last_published);
                self.logger.log_progress(&format!(
                    "{} frames, progress {:.2}, {} fast breaks",
                    last_published,
                    self.status.progress,
                    self.outcome.events.len()
                ));
                self.publish_status().await;
            }
        };

        self.finish(stop).await
    }

    /// Run one frame through every stage.
    async fn process_frame(&mut self, frame: &FrameRecord) -> WorkerResult<()> {
        let started = Instant::now();
        let objects = self.tracker.update(frame)?;
        self.observe(frame.frame_index, frame.timestamp, &objects).await;
        metrics::record_frame_processed(started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn observe(&mut self, frame_index: u64, timestamp: f64, objects: &[TrackedObject]) {
        if let Some(ball) = select_ball(objects) {
            self.trajectory.record(ball, frame_index, timestamp, &self.grid);
        }

        let resets_before = self.engine.stats().total_resets();

        if let Some(event) = self.possession.observe(frame_index, timestamp, objects) {
            self.outcome.passes += 1;
            metrics::record_pass(if event.is_loss() { "loss" } else { "pass" });

            match self.engine.process(&event) {
                Ok(Some(flagged)) => match self.emitter.emit(&flagged, &self.trajectory).await {
                    Ok(Some(fast_break)) => {
                        self.status.events_emitted += 1;
                        self.outcome.events.push(fast_break);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // Engine state stays terminal; the event is lost
                        self.outcome.storage_failures += 1;
                        self.logger
                            .log_frame_warning(Some(frame_index), &format!("event not stored: {}", e));
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    self.logger
                        .log_frame_warning(Some(frame_index), &format!("possession event rejected: {}", e));
                }
            }
        }

        // A pass committed later is dated at the oldest debounce frame
        let horizon = self.possession.pending_since().unwrap_or(timestamp);
        self.engine.advance_to(horizon);
        metrics::record_sequences_reset(self.engine.stats().total_resets() - resets_before);
    }

    /// Treat a failed frame as empty. Returns a stop reason once failures
    /// reach the configured limit.
    fn frame_failed(
        &mut self,
        frame_index: Option<u64>,
        kind: &str,
        error: &WorkerError,
        consecutive: u32,
    ) -> Option<Stop> {
        self.outcome.frame_failures += 1;
        metrics::record_frame_failure(kind);
        self.logger.log_frame_warning(
            frame_index,
            &format!("frame treated as empty ({} consecutive): {}", consecutive, error),
        );
        self.tracker.tick();

        (consecutive >= self.settings.max_consecutive_failures).then(|| {
            Stop::Failed(format!("{} consecutive frame failures, last: {}", consecutive, error))
        })
    }

    async fn finish(mut self, stop: Stop) -> PipelineOutcome {
        // A BUILDING sequence is never emitted once the stream stops
        if self.engine.discard() {
            metrics::record_sequences_reset(1);
        }
        self.status.record_frames(self.outcome.frames_processed);

        match stop {
            Stop::Exhausted => {
                self.status.complete();
                self.logger.log_completion(&format!(
                    "frames={} passes={} fast_breaks={}",
                    self.outcome.frames_processed,
                    self.outcome.passes,
                    self.outcome.events.len()
                ));
            }
            Stop::Cancelled => {
                self.status.cancel();
                self.logger
                    .log_completion(&format!("cancelled after {} frames", self.outcome.frames_processed));
            }
            Stop::Failed(cause) => {
                self.logger.log_error(&cause);
                self.status.fail(cause.clone());
                self.outcome.error = Some(cause);
            }
        }

        self.publish_status().await;
        self.outcome.status = self.status.status;
        metrics::record_match_finished(self.outcome.status.as_str());

        debug!(
            match_id = %self.match_id,
            tracker = ?self.tracker.stats(),
            possession = ?self.possession.stats(),
            sequences = ?self.engine.stats(),
            "Pipeline stats"
        );
        self.outcome
    }

    async fn publish_status(&self) {
        if let Err(e) = self.status_store.put(&self.status).await {
            warn!(match_id = %self.match_id, error = %e, "Failed to publish match status");
        }
    }
}

fn source_failure_kind(error: &WorkerError) -> &'static str {
    match error {
        WorkerError::Source(SourceError::Parse { .. }) => "parse",
        _ => "source",
    }
}

/// Resolves once cancellation is requested. Never resolves if the sender
/// is gone without having cancelled.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
