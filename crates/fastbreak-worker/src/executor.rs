//! Match executor.
//!
//! One tokio task per match, bounded by a semaphore. Matches share only the
//! sinks; each task owns its pipeline and detection source.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use fastbreak_analysis::AnalysisConfig;
use fastbreak_jobs::{AnalyzeMatchJob, StatusStore};
use fastbreak_models::{MatchId, MatchStatus, MatchStatusCache};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{cancelled, MatchPipeline, PipelineOutcome, PipelineSettings, PipelineSinks};
use crate::source::{DetectionSource, JsonLinesSource};

/// Runs matches concurrently, at most `max_concurrent_matches` at a time.
pub struct MatchExecutor {
    analysis: Arc<AnalysisConfig>,
    settings: PipelineSettings,
    sinks: PipelineSinks,
    semaphore: Arc<Semaphore>,
}

impl MatchExecutor {
    /// Create a new executor. The analysis config is validated once here.
    pub fn new(
        analysis: AnalysisConfig,
        settings: PipelineSettings,
        sinks: PipelineSinks,
        max_concurrent_matches: usize,
    ) -> WorkerResult<Self> {
        analysis.validate()?;
        if max_concurrent_matches == 0 {
            return Err(WorkerError::config_error("max_concurrent_matches must be at least 1"));
        }

        Ok(Self {
            analysis: Arc::new(analysis),
            settings,
            sinks,
            semaphore: Arc::new(Semaphore::new(max_concurrent_matches)),
        })
    }

    /// Free match slots right now.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Start analyzing a match from any detection source.
    ///
    /// The match is reported as queued immediately and starts once a slot
    /// is free. Cancelling while queued ends it without reading a frame.
    pub fn spawn<S>(&self, match_id: MatchId, source: S) -> MatchHandle
    where
        S: DetectionSource + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let analysis = Arc::clone(&self.analysis);
        let settings = self.settings.clone();
        let sinks = self.sinks.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let task_match_id = match_id.clone();

        let join = tokio::spawn(async move {
            let match_id = task_match_id;
            let mut source = source;
            publish(sinks.status.as_ref(), &MatchStatusCache::new(match_id.clone())).await;

            let permit = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                let mut status = MatchStatusCache::new(match_id.clone());
                status.cancel();
                publish(sinks.status.as_ref(), &status).await;
                info!(match_id = %match_id, "Match cancelled before start");
                return PipelineOutcome::stopped(match_id, MatchStatus::Cancelled, None);
            };

            let status_store = Arc::clone(&sinks.status);
            let pipeline = match MatchPipeline::new(match_id.clone(), &analysis, settings, sinks) {
                Ok(pipeline) => pipeline,
                Err(e) => return fail_before_start(status_store.as_ref(), match_id, &e).await,
            };

            pipeline.run(&mut source, cancel_rx).await
        });

        MatchHandle {
            match_id,
            cancel: CancelToken(Arc::new(cancel_tx)),
            join,
        }
    }

    /// Start analyzing a match job backed by a JSON lines detections file.
    pub async fn spawn_job(&self, job: AnalyzeMatchJob) -> WorkerResult<MatchHandle> {
        info!(
            job_id = %job.job_id,
            match_id = %job.match_id,
            path = %job.detections_path.display(),
            "Starting match job"
        );

        match JsonLinesSource::open(&job.detections_path).await {
            Ok(source) => Ok(self.spawn(job.match_id, source)),
            Err(e) => {
                let e = WorkerError::from(e);
                fail_before_start(self.sinks.status.as_ref(), job.match_id, &e).await;
                Err(e)
            }
        }
    }
}

async fn fail_before_start(store: &dyn StatusStore, match_id: MatchId, error: &WorkerError) -> PipelineOutcome {
    warn!(match_id = %match_id, error = %error, "Match failed before start");
    let mut status = MatchStatusCache::new(match_id.clone());
    status.fail(error.to_string());
    publish(store, &status).await;
    PipelineOutcome::stopped(match_id, MatchStatus::Failed, Some(error.to_string()))
}

async fn publish(store: &dyn StatusStore, status: &MatchStatusCache) {
    if let Err(e) = store.put(status).await {
        warn!(match_id = %status.match_id, error = %e, "Failed to publish match status");
    }
}

/// Requests cancellation of one match. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// A running match.
pub struct MatchHandle {
    match_id: MatchId,
    cancel: CancelToken,
    join: JoinHandle<PipelineOutcome>,
}

impl MatchHandle {
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Stop the match at its next frame boundary. No event is emitted for
    /// a sequence still being built.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the match to finish.
    pub async fn join(self) -> WorkerResult<PipelineOutcome> {
        self.join.await.map_err(|e| {
            WorkerError::job_failed(format!("match task for {} ended abnormally: {}", self.match_id, e))
        })
    }
}
