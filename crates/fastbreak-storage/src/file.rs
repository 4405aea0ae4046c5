//! JSON file event store.
//!
//! Layout: `<root>/<match_id>/<event_id>.json`, one pretty-printed event per
//! file. Files are created with `create_new`, so an event is never
//! overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use fastbreak_models::{FastBreakEvent, MatchId};

use crate::error::{StorageError, StorageResult};
use crate::sink::{sort_events, EventStore};

/// Event store writing one JSON file per event.
#[derive(Debug, Clone)]
pub struct JsonFileEventStore {
    root: PathBuf,
}

impl JsonFileEventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn match_dir(&self, match_id: &MatchId) -> StorageResult<PathBuf> {
        validate_segment(match_id.as_str())?;
        Ok(self.root.join(match_id.as_str()))
    }

    /// Path an event is written to.
    pub fn event_path(&self, event: &FastBreakEvent) -> StorageResult<PathBuf> {
        validate_segment(&event.id)?;
        Ok(self.match_dir(&event.match_id)?.join(format!("{}.json", event.id)))
    }
}

/// Keys become path segments, so reject anything that could escape the root.
fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
    {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    async fn write_event(&self, event: &FastBreakEvent) -> StorageResult<()> {
        let path = self.event_path(event)?;
        let body = serde_json::to_vec_pretty(event)?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::already_exists(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_all(&mut file, &body).await {
            // Leave nothing half-written behind
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %remove_err, "Failed to remove partial event file");
            }
            return Err(StorageError::write_failed(format!("{}: {}", path.display(), e)));
        }

        debug!(
            match_id = %event.match_id,
            event_id = %event.id,
            path = %path.display(),
            "Wrote event file"
        );
        Ok(())
    }

    async fn list_events(&self, match_id: &MatchId) -> StorageResult<Vec<FastBreakEvent>> {
        let dir = self.match_dir(match_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            events.push(serde_json::from_slice::<FastBreakEvent>(&bytes)?);
        }
        sort_events(&mut events);
        Ok(events)
    }
}

async fn write_all(file: &mut tokio::fs::File, body: &[u8]) -> std::io::Result<()> {
    file.write_all(body).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    file.sync_all().await
}
