//! JSON feed adapter
//!
//! Downloads a whole snapshot document from a bulk-export URL. The wire
//! format is the `Snapshot` serialization itself, so feeds and cache
//! files share field names.

use crate::error::{Result, SyncError};
use crate::listing::{Snapshot, SourceInfo};
use crate::source::SourceAdapter;
use async_trait::async_trait;

/// Network-fetch source reading full snapshot documents over HTTP
pub struct HttpSource {
    info: SourceInfo,
    inventory_url: Option<String>,
    buylist_url: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(
        info: SourceInfo,
        inventory_url: Option<String>,
        buylist_url: Option<String>,
    ) -> Self {
        Self {
            info,
            inventory_url,
            buylist_url,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Snapshot> {
        log::info!("Fetching snapshot from {}...", url);

        let response = self
            .client
            .get(url)
            .header("User-Agent", "catalog_sync/1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status()));
        }

        let snapshot: Snapshot = response.json().await?;
        log::info!(
            "Fetched {} items for {} (captured: {})",
            snapshot.len(),
            self.info.shorthand,
            snapshot.captured_at
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    async fn inventory(&self) -> Result<Snapshot> {
        let url = self
            .inventory_url
            .as_deref()
            .ok_or_else(|| SyncError::EmptySnapshot(self.info.shorthand.clone()))?;
        self.fetch(url).await
    }

    async fn buylist(&self) -> Result<Snapshot> {
        let url = self
            .buylist_url
            .as_deref()
            .ok_or_else(|| SyncError::EmptySnapshot(self.info.shorthand.clone()))?;
        self.fetch(url).await
    }
}
