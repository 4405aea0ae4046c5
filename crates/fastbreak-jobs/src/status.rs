//! Job status interface polled by external callers.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::debug;

use fastbreak_models::{MatchId, MatchStatusCache};

use crate::error::{JobsError, JobsResult};

/// Default time-to-live for status entries in Redis (24 hours).
pub const DEFAULT_STATUS_TTL_SECS: u64 = 86_400;

/// Where a match's status is published.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Publish the latest status snapshot.
    async fn put(&self, status: &MatchStatusCache) -> JobsResult<()>;

    /// Latest status for a match, if any was published.
    async fn get(&self, match_id: &MatchId) -> JobsResult<Option<MatchStatusCache>>;
}

/// In-process status store. Keeps every published snapshot.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    history: RwLock<HashMap<MatchId, Vec<MatchStatusCache>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot published for a match, oldest first.
    pub async fn history(&self, match_id: &MatchId) -> Vec<MatchStatusCache> {
        self.history
            .read()
            .await
            .get(match_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&self, status: &MatchStatusCache) -> JobsResult<()> {
        self.history
            .write()
            .await
            .entry(status.match_id.clone())
            .or_default()
            .push(status.clone());
        Ok(())
    }

    async fn get(&self, match_id: &MatchId) -> JobsResult<Option<MatchStatusCache>> {
        Ok(self
            .history
            .read()
            .await
            .get(match_id)
            .and_then(|h| h.last().cloned()))
    }
}

/// Status store keeping one JSON snapshot per match in Redis.
pub struct RedisStatusStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisStatusStore {
    /// Create a new Redis status store.
    pub fn new(redis_url: &str) -> JobsResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl_secs: DEFAULT_STATUS_TTL_SECS,
        })
    }

    /// Override the entry time-to-live.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Redis key for a match's status.
    pub fn key(match_id: &MatchId) -> String {
        format!("fastbreak:status:{}", match_id)
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn put(&self, status: &MatchStatusCache) -> JobsResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(&status.match_id);
        let payload = serde_json::to_string(status)?;

        debug!(
            match_id = %status.match_id,
            status = %status.status,
            progress = status.progress,
            "Publishing match status"
        );
        conn.set_ex::<_, _, ()>(&key, payload, self.ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, match_id: &MatchId) -> JobsResult<Option<MatchStatusCache>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::key(match_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(JobsError::from))
            .transpose()
    }
}
