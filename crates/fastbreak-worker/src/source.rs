//! Detection sources.
//!
//! The detector itself is external; the pipeline only sees an ordered
//! stream of frame records. Replay implementations are provided for
//! pre-computed detections.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use fastbreak_models::FrameRecord;

use crate::error::SourceError;

/// An ordered, finite stream of per-frame detections.
#[async_trait]
pub trait DetectionSource: Send {
    /// The next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError>;

    /// Total number of frames, when known up front.
    fn total_frames(&self) -> Option<u64>;
}

#[async_trait]
impl<S: DetectionSource + ?Sized> DetectionSource for Box<S> {
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError> {
        (**self).next_frame().await
    }

    fn total_frames(&self) -> Option<u64> {
        (**self).total_frames()
    }
}

/// Replays frames held in memory, optionally pausing before each one.
#[derive(Debug, Clone)]
pub struct VecSource {
    frames: VecDeque<FrameRecord>,
    total: u64,
    delay: Option<Duration>,
}

impl VecSource {
    pub fn new(frames: Vec<FrameRecord>) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into(),
            delay: None,
        }
    }

    /// Pause before yielding each frame, to simulate detector latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl DetectionSource for VecSource {
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.frames.pop_front())
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// Replays a JSON lines file, one `FrameRecord` per non-blank line.
///
/// A malformed line yields a `SourceError::Parse`; reading continues with
/// the next line on the following call.
pub struct JsonLinesSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    total: u64,
}

impl JsonLinesSource {
    /// Open a detections file, counting its frames up front.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();

        let mut total = 0u64;
        let mut counter = BufReader::new(File::open(&path).await?).lines();
        while let Some(line) = counter.next_line().await? {
            if !line.trim().is_empty() {
                total += 1;
            }
        }

        let lines = BufReader::new(File::open(&path).await?).lines();
        debug!(path = %path.display(), total_frames = total, "Opened detections file");

        Ok(Self {
            path,
            lines,
            line_number: 0,
            total,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DetectionSource for JsonLinesSource {
    async fn next_frame(&mut self) -> Result<Option<FrameRecord>, SourceError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| SourceError::parse(self.line_number, e.to_string()));
        }
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }
}
