//! Core data model: listings, snapshots, and source metadata
//!
//! A `Snapshot` is the complete output of one acquisition from one source.
//! Snapshots are produced wholesale and never merged into older data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One priced offer for one item variant at one source
///
/// Insertion order within a snapshot record is the provider's ranking
/// (best condition first), so `entries[0]` is the headline price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Condition grade (NM, SP, MP, HP, PO)
    pub conditions: String,
    /// Unit price (sell side) or buy price (buy side)
    pub price: f64,
    /// Quantity available
    pub quantity: u32,
    /// Store-credit price, buy side only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trade_price: Option<f64>,
    /// Buy price relative to a reference retail price, buy side only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price_ratio: Option<f64>,
    /// Canonical listing URL
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub url: String,
    /// Sub-seller name, set only by market sources
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seller: Option<String>,
    /// Source-specific extra fields
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub custom_fields: HashMap<String, String>,
}

impl Listing {
    /// A minimal NM listing, mostly useful as a starting point
    pub fn new(price: f64, quantity: u32) -> Self {
        Self {
            conditions: "NM".to_string(),
            price,
            quantity,
            trade_price: None,
            price_ratio: None,
            url: String::new(),
            seller: None,
            custom_fields: HashMap::new(),
        }
    }
}

/// A complete, immutable set of listings captured from one source
/// at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Wall-clock time the snapshot was captured
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    /// Item identifier -> listings, provider-ranked
    pub records: BTreeMap<String, Vec<Listing>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            captured_at: Utc::now(),
            records: BTreeMap::new(),
        }
    }

    /// Append a listing to an item's record, preserving provider order
    pub fn add(&mut self, item_id: &str, listing: Listing) {
        self.records
            .entry(item_id.to_string())
            .or_default()
            .push(listing);
    }

    /// Number of items with at least one listing
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<&[Listing]> {
        self.records.get(item_id).map(|v| v.as_slice())
    }

    /// Split a market snapshot into one sub-snapshot per named seller
    ///
    /// Listings whose seller is not in `keepers` are dropped. Every keeper
    /// gets an entry in the result, possibly empty, so callers can tell
    /// "keeper produced nothing" apart from "keeper unknown".
    pub fn split_sellers(&self, keepers: &[String]) -> BTreeMap<String, Snapshot> {
        let mut out: BTreeMap<String, Snapshot> = BTreeMap::new();
        for name in keepers {
            let mut sub = Snapshot::new();
            sub.captured_at = self.captured_at;
            out.insert(name.clone(), sub);
        }

        for (item_id, listings) in &self.records {
            for listing in listings {
                let Some(seller) = &listing.seller else {
                    continue;
                };
                if let Some(sub) = out.get_mut(seller) {
                    sub.add(item_id, listing.clone());
                }
            }
        }

        out
    }
}

/// Identity and capability metadata for one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Display name
    pub name: String,
    /// Short code, unique across the catalog
    pub shorthand: String,
    /// Source publishes retail inventory
    #[serde(default)]
    pub sell_side: bool,
    /// Source publishes a buylist
    #[serde(default)]
    pub buy_side: bool,
    /// Source deals in bundled product rather than physical singles
    #[serde(default)]
    pub sealed: bool,
    /// When the inventory side was last captured
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub inventory_timestamp: Option<DateTime<Utc>>,
    /// When the buylist side was last captured
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub buylist_timestamp: Option<DateTime<Utc>>,
}

impl SourceInfo {
    /// Metadata for a keeper sub-source, inheriting everything but the identity
    pub fn for_keeper(&self, keeper: &str) -> SourceInfo {
        SourceInfo {
            name: keeper.to_string(),
            shorthand: keeper.to_string(),
            ..self.clone()
        }
    }
}

/// One source's current data as held by the catalog: metadata plus the
/// snapshot it last published. This is also the snapshot cache file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceData {
    pub info: SourceInfo,
    pub snapshot: Snapshot,
}

impl SourceData {
    pub fn new(info: SourceInfo, snapshot: Snapshot) -> Self {
        Self { info, snapshot }
    }
}
