//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised by a detection source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Detection source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Detection source error: {0}")]
    Source(#[from] SourceError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] fastbreak_analysis::AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] fastbreak_storage::StorageError),

    #[error("Job status error: {0}")]
    Jobs(#[from] fastbreak_jobs::JobsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}
