//! Snapshot cache: last-known-good snapshots on disk, optionally mirrored
//! to remote object storage
//!
//! One pretty-printed JSON file per source per side, named by shorthand.
//! The cache exists for fast cold start; a missing or corrupt file only
//! means that source is absent until its next successful refresh.

use crate::error::{Result, SyncError};
use crate::listing::SourceData;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bound on a single remote mirror upload
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Which side of the catalog a snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Inventory,
    Buylist,
}

impl Side {
    /// Subdirectory (and remote prefix) for this side
    pub fn dir(&self) -> &'static str {
        match self {
            Side::Inventory => "inventory",
            Side::Buylist => "buylist",
        }
    }
}

/// Local filesystem cache of last-known-good snapshots
pub struct SnapshotCache {
    root: PathBuf,
}

impl SnapshotCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache location: ~/.local/share/catalog_sync/cache
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("catalog_sync")
            .join("cache")
    }

    fn path_for(&self, side: Side, shorthand: &str) -> PathBuf {
        self.root.join(side.dir()).join(format!("{}.json", shorthand))
    }

    /// Persist one source's snapshot, overwriting any previous entry
    pub fn store(&self, side: Side, data: &SourceData) -> Result<()> {
        let path = self.path_for(side, &data.info.shorthand);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, content)?;

        log::debug!(
            "Cached {} {} snapshot ({} items)",
            data.info.shorthand,
            side.dir(),
            data.snapshot.len()
        );
        Ok(())
    }

    /// Load one source's last-known-good snapshot
    pub fn load(&self, side: Side, shorthand: &str) -> Result<SourceData> {
        let path = self.path_for(side, shorthand);
        let content = std::fs::read_to_string(&path)?;
        let data: SourceData = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Load every cached snapshot for one side
    ///
    /// Per-file failures are logged and skipped; a partial cache is still
    /// better than an empty catalog.
    pub fn load_all(&self, side: Side) -> Vec<SourceData> {
        let dir = self.root.join(side.dir());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::info!("No {} cache at {}: {}", side.dir(), dir.display(), e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match read_source_file(&path) {
                Ok(data) => {
                    log::info!(
                        "Loaded {} from cache with {} items",
                        data.info.shorthand,
                        data.snapshot.len()
                    );
                    out.push(data);
                }
                Err(e) => {
                    log::warn!("Skipping cache file {}: {}", path.display(), e);
                }
            }
        }
        out
    }
}

fn read_source_file(path: &Path) -> Result<SourceData> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Mirrors cache files to remote object storage for cross-instance
/// sharing and backup
pub struct RemoteMirror {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteMirror {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Upload one snapshot document under the same naming convention the
    /// local cache uses
    pub async fn upload(&self, side: Side, data: &SourceData) -> Result<()> {
        let url = format!(
            "{}/{}/{}.json",
            self.base_url,
            side.dir(),
            data.info.shorthand
        );

        let response = self
            .client
            .put(&url)
            .header("User-Agent", "catalog_sync/1.0")
            .header("Content-Type", "application/json")
            .timeout(UPLOAD_TIMEOUT)
            .json(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Listing, Snapshot, SourceInfo};

    fn sample(shorthand: &str) -> SourceData {
        let mut snapshot = Snapshot::new();
        snapshot.add("item1", Listing::new(3.5, 2));
        let info = SourceInfo {
            name: "Example Cards".to_string(),
            shorthand: shorthand.to_string(),
            sell_side: true,
            buy_side: false,
            sealed: false,
            inventory_timestamp: None,
            buylist_timestamp: None,
        };
        SourceData::new(info, snapshot)
    }

    #[test]
    fn store_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.store(Side::Inventory, &sample("EX")).unwrap();
        let back = cache.load(Side::Inventory, "EX").unwrap();

        assert_eq!(back.info.shorthand, "EX");
        assert_eq!(back.snapshot.get("item1").unwrap()[0].price, 3.5);
    }

    #[test]
    fn sides_are_kept_separate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.store(Side::Inventory, &sample("EX")).unwrap();
        assert!(cache.load(Side::Buylist, "EX").is_err());
    }

    #[test]
    fn load_all_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.store(Side::Inventory, &sample("AA")).unwrap();
        cache.store(Side::Inventory, &sample("BB")).unwrap();
        std::fs::write(dir.path().join("inventory").join("CC.json"), "not json").unwrap();

        let loaded = cache.load_all(Side::Inventory);
        let mut codes: Vec<&str> = loaded.iter().map(|d| d.info.shorthand.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["AA", "BB"]);
    }

    #[test]
    fn load_all_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nope"));
        assert!(cache.load_all(Side::Inventory).is_empty());
    }
}
