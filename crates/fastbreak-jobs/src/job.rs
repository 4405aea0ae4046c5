//! Job definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fastbreak_models::MatchId;

use crate::error::{JobsError, JobsResult};

/// Job to run fast-break analysis over one match's detection stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeMatchJob {
    /// Unique job ID
    pub job_id: String,
    /// Match being analyzed
    pub match_id: MatchId,
    /// Detection stream to replay (JSON lines, one frame per line)
    pub detections_path: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl AnalyzeMatchJob {
    /// Create a new analyze job.
    pub fn new(match_id: impl Into<MatchId>, detections_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            match_id: match_id.into(),
            detections_path: detections_path.into(),
            created_at: Utc::now(),
        }
    }

    /// Parse a `<match_id>=<path>` command-line argument.
    pub fn from_arg(arg: &str) -> JobsResult<Self> {
        let (match_id, path) = arg
            .split_once('=')
            .ok_or_else(|| JobsError::invalid_job(format!("expected <match_id>=<path>, got '{}'", arg)))?;
        let match_id = match_id.trim();
        let path = path.trim();
        if match_id.is_empty() || path.is_empty() {
            return Err(JobsError::invalid_job(format!(
                "match id and path must be non-empty in '{}'",
                arg
            )));
        }
        Ok(Self::new(MatchId::from_string(match_id), path))
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("analyze:{}", self.match_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arg() {
        let job = AnalyzeMatchJob::from_arg("final-2024=/data/final.jsonl").unwrap();
        assert_eq!(job.match_id.as_str(), "final-2024");
        assert_eq!(job.detections_path, PathBuf::from("/data/final.jsonl"));
        assert_eq!(job.idempotency_key(), "analyze:final-2024");
    }

    #[test]
    fn test_from_arg_rejects_malformed() {
        assert!(AnalyzeMatchJob::from_arg("no-separator").is_err());
        assert!(AnalyzeMatchJob::from_arg("=path.jsonl").is_err());
        assert!(AnalyzeMatchJob::from_arg("match=").is_err());
    }
}
