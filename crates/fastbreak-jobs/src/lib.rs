//! Match analysis jobs and status reporting.
//!
//! This crate provides:
//! - `AnalyzeMatchJob`: one match to analyze
//! - `StatusStore`: the polled job status interface, backed by memory or Redis

pub mod error;
pub mod job;
pub mod status;

pub use error::{JobsError, JobsResult};
pub use job::AnalyzeMatchJob;
pub use status::{MemoryStatusStore, RedisStatusStore, StatusStore, DEFAULT_STATUS_TTL_SECS};
