//! JSONBin leaderboard mirror
//!
//! The store is the authority for scores. The mirror keeps a legacy JSONBin
//! document (top 100 entries) in sync for older clients. Writes are
//! best-effort: they run on a spawned task and failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::MirrorConfig;
use crate::models::LeaderboardEntry;

/// Entries kept in the mirrored document
pub const LEADERBOARD_SIZE: usize = 100;

const JSONBIN_API: &str = "https://api.jsonbin.io/v3/b";

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Mirror request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mirror rejected write with status {0}")]
    Rejected(u16),
}

/// Destination for accepted scores
#[async_trait]
pub trait ScoreMirror: Send + Sync {
    async fn publish(&self, entry: LeaderboardEntry) -> Result<(), MirrorError>;
}

/// Push `entry` to the mirror without blocking the caller.
pub fn publish_in_background(mirror: Arc<dyn ScoreMirror>, entry: LeaderboardEntry) {
    tokio::spawn(async move {
        let name = entry.name.clone();
        if let Err(e) = mirror.publish(entry).await {
            tracing::warn!(player = %name, error = %e, "Leaderboard mirror update failed");
        }
    });
}

/// Insert an entry, keep the list sorted by score (descending) and cut it to `cap`.
pub fn merge_entry(
    mut entries: Vec<LeaderboardEntry>,
    entry: LeaderboardEntry,
    cap: usize,
) -> Vec<LeaderboardEntry> {
    entries.push(entry);
    // stable sort: equal scores keep insertion order
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(cap);
    entries
}

#[derive(Deserialize)]
struct LatestBin {
    #[serde(default)]
    record: Vec<LeaderboardEntry>,
}

/// JSONBin v3 client
pub struct JsonBinMirror {
    client: Client,
    bin_url: String,
    api_key: String,
}

impl JsonBinMirror {
    pub fn new(config: &MirrorConfig, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            bin_url: format!("{}/{}", JSONBIN_API, config.bin_id),
            api_key: config.api_key.clone(),
        }
    }

    async fn fetch(&self) -> Result<Vec<LeaderboardEntry>, MirrorError> {
        let latest = self
            .client
            .get(format!("{}/latest", self.bin_url))
            .header("X-Access-Key", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<LatestBin>()
            .await?;
        Ok(latest.record)
    }
}

#[async_trait]
impl ScoreMirror for JsonBinMirror {
    async fn publish(&self, entry: LeaderboardEntry) -> Result<(), MirrorError> {
        let current = self.fetch().await?;
        let updated = merge_entry(current, entry, LEADERBOARD_SIZE);

        let response = self
            .client
            .put(&self.bin_url)
            .header("X-Access-Key", &self.api_key)
            .json(&updated)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MirrorError::Rejected(response.status().as_u16()));
        }
        tracing::debug!(entries = updated.len(), "Leaderboard mirror updated");
        Ok(())
    }
}
