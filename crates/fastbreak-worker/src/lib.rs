//! Fast-break analysis worker.
//!
//! This crate provides:
//! - Detection sources (in-memory and JSON lines replay)
//! - The per-match pipeline from detections to stored events
//! - A bounded executor running matches concurrently
//! - Cancellation, per-frame timeouts and progress reporting

pub mod config;
pub mod emitter;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod source;

pub use config::{analysis_config_from_env, analysis_config_from_lookup, WorkerConfig};
pub use emitter::FastBreakEmitter;
pub use error::{SourceError, WorkerError, WorkerResult};
pub use executor::{CancelToken, MatchExecutor, MatchHandle};
pub use logging::MatchLogger;
pub use pipeline::{MatchPipeline, PipelineOutcome, PipelineSettings, PipelineSinks};
pub use source::{DetectionSource, JsonLinesSource, VecSource};
