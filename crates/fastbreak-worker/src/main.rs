//! Fast-break worker binary.
//!
//! Usage: `fastbreak-worker <match_id>=<detections.jsonl> [...]`

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fastbreak_jobs::{AnalyzeMatchJob, MemoryStatusStore, RedisStatusStore, StatusStore};
use fastbreak_storage::{HeatmapAggregator, JsonFileEventStore, MemoryHeatmap};
use fastbreak_worker::{analysis_config_from_env, metrics, MatchExecutor, PipelineSinks, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("fastbreak=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let jobs = std::env::args()
        .skip(1)
        .map(|arg| AnalyzeMatchJob::from_arg(&arg))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid match argument")?;
    if jobs.is_empty() {
        bail!("usage: fastbreak-worker <match_id>=<detections.jsonl> [...]");
    }

    info!("Starting fastbreak-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    let analysis = analysis_config_from_env().context("invalid analysis configuration")?;

    if let Some(addr) = &config.metrics_addr {
        metrics::init_metrics(addr).context("failed to start metrics exporter")?;
    }

    let status: Arc<dyn StatusStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStatusStore::new(url).context("failed to connect to Redis")?),
        None => Arc::new(MemoryStatusStore::new()),
    };
    let heatmap = Arc::new(MemoryHeatmap::new());
    let sinks = PipelineSinks {
        events: Arc::new(JsonFileEventStore::new(config.output_dir.clone())),
        heatmap: heatmap.clone(),
        status,
    };

    let executor = MatchExecutor::new(analysis, config.pipeline_settings(), sinks, config.max_concurrent_matches)?;

    let mut failed = 0usize;
    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        match executor.spawn_job(job).await {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!("Failed to start match: {}", e);
                failed += 1;
            }
        }
    }

    // Setup signal handler
    let cancellers: Vec<_> = handles.iter().map(|h| h.canceller()).collect();
    let shutdown_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, cancelling matches");
            for canceller in &cancellers {
                canceller.cancel();
            }
        }
    });

    let results = futures::future::join_all(handles.into_iter().map(|h| h.join())).await;
    shutdown_handle.abort();

    for result in results {
        match result {
            Ok(outcome) => {
                info!(
                    match_id = %outcome.match_id,
                    status = %outcome.status,
                    frames = outcome.frames_processed,
                    passes = outcome.passes,
                    fast_breaks = outcome.events.len(),
                    timeouts = outcome.timeouts,
                    frame_failures = outcome.frame_failures,
                    "Match finished"
                );
                match heatmap.heatmap(&outcome.match_id).await {
                    Ok(counts) if !counts.is_empty() => {
                        info!(match_id = %outcome.match_id, "Zone heatmap: {}", serde_json::to_string(&counts)?);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(match_id = %outcome.match_id, "Failed to read heatmap: {}", e),
                }
                if !outcome.is_success() {
                    failed += 1;
                }
            }
            Err(e) => {
                error!("{}", e);
                failed += 1;
            }
        }
    }

    info!("Worker shutdown complete");
    if failed > 0 {
        bail!("{} match(es) did not complete", failed);
    }
    Ok(())
}
