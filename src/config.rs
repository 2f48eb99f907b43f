//! Configuration file handling
//!
//! The source roster lives in a JSON file: identity, capability flags,
//! and how each source acquires its data (feed URL or warehouse table).

use crate::error::Result;
use crate::listing::SourceInfo;
use crate::source::http::HttpSource;
use crate::source::warehouse::WarehouseSource;
use crate::source::{Initializer, SourceAdapter, SourceDescriptor, DEFAULT_FETCH_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the remote snapshot mirror, if any
    #[serde(default)]
    pub mirror_url: Option<String>,
    /// Path to the historical price database, if recording is wanted
    #[serde(default)]
    pub history_db: Option<PathBuf>,
    /// The source roster
    pub sources: Vec<SourceConfig>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// How one source acquires its snapshots
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Acquisition {
    /// Network fetch of a whole snapshot document
    Feed {
        #[serde(default)]
        inventory_url: Option<String>,
        #[serde(default)]
        buylist_url: Option<String>,
    },
    /// Bulk-export tables in a warehouse database
    Warehouse {
        db: PathBuf,
        #[serde(default)]
        inventory_table: Option<String>,
        #[serde(default)]
        buylist_table: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

/// One configured source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub shorthand: String,
    #[serde(default = "default_true")]
    pub sell_side: bool,
    #[serde(default = "default_true")]
    pub buy_side: bool,
    #[serde(default)]
    pub sealed: bool,
    /// Sub-sellers kept when decomposing a market snapshot
    #[serde(default)]
    pub keepers: Vec<String>,
    #[serde(default)]
    pub record_history: bool,
    /// Per-source override of the acquisition timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub acquisition: Acquisition,
}

impl SourceConfig {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name.clone(),
            shorthand: self.shorthand.clone(),
            sell_side: self.sell_side,
            buy_side: self.buy_side,
            sealed: self.sealed,
            inventory_timestamp: None,
            buylist_timestamp: None,
        }
    }

    /// Build the descriptor, with an initializer that allocates a fresh
    /// adapter of the configured kind on every refresh
    pub fn descriptor(&self) -> SourceDescriptor {
        let info = self.info();
        let acquisition = self.acquisition.clone();

        let init: Initializer = Box::new(move || {
            let adapter: Box<dyn SourceAdapter> = match &acquisition {
                Acquisition::Feed {
                    inventory_url,
                    buylist_url,
                } => Box::new(HttpSource::new(
                    info.clone(),
                    inventory_url.clone(),
                    buylist_url.clone(),
                )),
                Acquisition::Warehouse {
                    db,
                    inventory_table,
                    buylist_table,
                } => Box::new(WarehouseSource::new(
                    info.clone(),
                    db.clone(),
                    inventory_table.clone(),
                    buylist_table.clone(),
                )),
            };
            Ok(adapter)
        });

        let mut descriptor = SourceDescriptor::new(&self.name, &self.shorthand, init);
        descriptor.sell_side = self.sell_side;
        descriptor.buy_side = self.buy_side;
        descriptor.sealed = self.sealed;
        descriptor.keepers = self.keepers.clone();
        descriptor.record_history = self.record_history;
        descriptor.timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "mirror_url": "https://mirror.example.com/snapshots",
        "history_db": "/var/lib/catalog_sync/history.db",
        "sources": [
            {
                "name": "Example Cards",
                "shorthand": "EX",
                "kind": "feed",
                "inventory_url": "https://example.com/inventory.json",
                "buylist_url": "https://example.com/buylist.json",
                "record_history": true
            },
            {
                "name": "Big Market",
                "shorthand": "BM",
                "buy_side": false,
                "kind": "feed",
                "inventory_url": "https://market.example.com/all.json",
                "keepers": ["Market Low", "Market Trend"],
                "timeout_secs": 120
            },
            {
                "name": "Warehouse Cards",
                "shorthand": "WH",
                "kind": "warehouse",
                "db": "/var/lib/catalog_sync/warehouse.db",
                "inventory_table": "wh_retail",
                "buylist_table": "wh_buylist"
            }
        ]
    }"#;

    #[test]
    fn parses_full_config() {
        let config: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(
            config.mirror_url.as_deref(),
            Some("https://mirror.example.com/snapshots")
        );
        assert!(config.history_db.is_some());
    }

    #[test]
    fn descriptor_carries_flags_and_keepers() {
        let config: AppConfig = serde_json::from_str(SAMPLE).unwrap();

        let ex = config.sources[0].descriptor();
        assert!(ex.sell_side && ex.buy_side);
        assert!(ex.record_history);
        assert!(!ex.is_market());

        let bm = config.sources[1].descriptor();
        assert!(!bm.buy_side);
        assert!(bm.is_market());
        assert_eq!(bm.keepers.len(), 2);
        assert_eq!(bm.timeout, Duration::from_secs(120));
    }

    #[test]
    fn initializer_allocates_fresh_adapters() {
        let config: AppConfig = serde_json::from_str(SAMPLE).unwrap();
        let descriptor = config.sources[0].descriptor();

        let first = descriptor.init().unwrap();
        let second = descriptor.init().unwrap();
        assert_eq!(first.info().shorthand, second.info().shorthand);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let bad = r#"{
            "sources": [
                {"name": "X", "shorthand": "X", "kind": "carrier_pigeon"}
            ]
        }"#;
        assert!(serde_json::from_str::<AppConfig>(bad).is_err());
    }
}
