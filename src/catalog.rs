//! The process-wide catalog store
//!
//! Two parallel collections (sell-side and buy-side) behind a single
//! swappable handle. Publication always builds a brand-new generation and
//! replaces the handle in one step; data a reader already fetched is never
//! mutated underneath it. Readers clone the current `Arc` and keep a
//! coherent view for as long as they hold it.

use crate::listing::SourceData;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// The full set of sources' current data visible to readers at one
/// point in time
#[derive(Debug, Default)]
pub struct CatalogGeneration {
    /// Sell-side sources, sorted by (name, shorthand)
    pub sellers: Vec<Arc<SourceData>>,
    /// Buy-side sources, sorted by (name, shorthand)
    pub vendors: Vec<Arc<SourceData>>,
}

impl CatalogGeneration {
    pub fn find_seller(&self, shorthand: &str) -> Option<&Arc<SourceData>> {
        self.sellers.iter().find(|s| s.info.shorthand == shorthand)
    }

    pub fn find_vendor(&self, shorthand: &str) -> Option<&Arc<SourceData>> {
        self.vendors.iter().find(|v| v.info.shorthand == shorthand)
    }
}

/// Aggregate counts derived from the current generation
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStats {
    pub sellers: usize,
    pub vendors: usize,
    pub unique_items: usize,
    pub total_listings: usize,
}

/// Atomically-replaceable view over the current catalog generation
#[derive(Default)]
pub struct CatalogStore {
    generation: RwLock<Arc<CatalogGeneration>>,
    ready: AtomicBool,
    last_update: RwLock<Option<String>>,
    stats: RwLock<CatalogStats>,
}

/// Deterministic total order for source lists: display name first,
/// shorthand as tie-break
fn sort_sources(sources: &mut [Arc<SourceData>]) {
    sources.sort_by(|a, b| {
        a.info
            .name
            .cmp(&b.info.name)
            .then_with(|| a.info.shorthand.cmp(&b.info.shorthand))
    });
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published generation
    pub fn current(&self) -> Arc<CatalogGeneration> {
        Arc::clone(&self.generation.read().unwrap())
    }

    /// Replace the whole catalog in one swap
    ///
    /// Both lists are sorted here so consumers that assume positional
    /// stability see the same ordering on every publication.
    pub fn publish(&self, sellers: Vec<SourceData>, vendors: Vec<SourceData>) {
        let mut sellers: Vec<Arc<SourceData>> = sellers.into_iter().map(Arc::new).collect();
        let mut vendors: Vec<Arc<SourceData>> = vendors.into_iter().map(Arc::new).collect();
        sort_sources(&mut sellers);
        sort_sources(&mut vendors);

        let generation = Arc::new(CatalogGeneration { sellers, vendors });
        *self.generation.write().unwrap() = generation;
        *self.last_update.write().unwrap() = Some(Utc::now().to_rfc3339());
    }

    /// Replace one sell-side entry, leaving every other entry untouched
    ///
    /// Only splices entries already present in the current generation;
    /// returns false (and publishes nothing) for an unknown shorthand.
    /// New sources enter the catalog only through a full publication.
    pub fn splice_seller(&self, shorthand: &str, data: SourceData) -> bool {
        self.splice(shorthand, data, true)
    }

    /// Replace one buy-side entry, leaving every other entry untouched
    pub fn splice_vendor(&self, shorthand: &str, data: SourceData) -> bool {
        self.splice(shorthand, data, false)
    }

    fn splice(&self, shorthand: &str, data: SourceData, sell_side: bool) -> bool {
        let mut generation = self.generation.write().unwrap();

        let list = if sell_side {
            &generation.sellers
        } else {
            &generation.vendors
        };
        let Some(idx) = list.iter().position(|s| s.info.shorthand == shorthand) else {
            return false;
        };

        let mut sellers = generation.sellers.clone();
        let mut vendors = generation.vendors.clone();
        if sell_side {
            sellers[idx] = Arc::new(data);
        } else {
            vendors[idx] = Arc::new(data);
        }

        *generation = Arc::new(CatalogGeneration { sellers, vendors });
        true
    }

    /// Whether the first successful cycle has completed; transitions
    /// false -> true exactly once and is never reset
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// RFC3339 timestamp of the last whole-generation publication
    pub fn last_update(&self) -> Option<String> {
        self.last_update.read().unwrap().clone()
    }

    pub fn stats(&self) -> CatalogStats {
        *self.stats.read().unwrap()
    }

    /// Recompute aggregate counts from the current generation; called once
    /// per successful bulk cycle
    pub fn recompute_stats(&self) -> CatalogStats {
        let generation = self.current();

        let mut unique: HashSet<&str> = HashSet::new();
        let mut total_listings = 0;
        for source in generation.sellers.iter().chain(generation.vendors.iter()) {
            for (item_id, listings) in &source.snapshot.records {
                unique.insert(item_id.as_str());
                total_listings += listings.len();
            }
        }

        let stats = CatalogStats {
            sellers: generation.sellers.len(),
            vendors: generation.vendors.len(),
            unique_items: unique.len(),
            total_listings,
        };
        *self.stats.write().unwrap() = stats;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Listing, Snapshot, SourceInfo};

    fn source(name: &str, shorthand: &str, items: &[(&str, f64)]) -> SourceData {
        let mut snapshot = Snapshot::new();
        for (item, price) in items {
            snapshot.add(item, Listing::new(*price, 1));
        }
        let info = SourceInfo {
            name: name.to_string(),
            shorthand: shorthand.to_string(),
            sell_side: true,
            buy_side: true,
            sealed: false,
            inventory_timestamp: None,
            buylist_timestamp: None,
        };
        SourceData::new(info, snapshot)
    }

    #[test]
    fn publish_sorts_by_name_then_shorthand() {
        let store = CatalogStore::new();
        store.publish(
            vec![
                source("Zeta Cards", "ZC", &[]),
                source("Alpha Cards", "AC2", &[]),
                source("Alpha Cards", "AC1", &[]),
            ],
            vec![],
        );

        let generation = store.current();
        let codes: Vec<&str> = generation
            .sellers
            .iter()
            .map(|s| s.info.shorthand.as_str())
            .collect();
        assert_eq!(codes, vec!["AC1", "AC2", "ZC"]);
    }

    #[test]
    fn splice_replaces_only_the_matching_entry() {
        let store = CatalogStore::new();
        store.publish(
            vec![
                source("Alpha Cards", "AC", &[("item1", 10.0)]),
                source("Beta Cards", "BC", &[("item2", 5.0)]),
            ],
            vec![],
        );

        let ok = store.splice_seller("AC", source("Alpha Cards", "AC", &[("item1", 12.0)]));
        assert!(ok);

        let generation = store.current();
        let alpha = generation.find_seller("AC").unwrap();
        let beta = generation.find_seller("BC").unwrap();
        assert_eq!(alpha.snapshot.get("item1").unwrap()[0].price, 12.0);
        assert_eq!(beta.snapshot.get("item2").unwrap()[0].price, 5.0);
    }

    #[test]
    fn splice_unknown_shorthand_changes_nothing() {
        let store = CatalogStore::new();
        store.publish(vec![source("Alpha Cards", "AC", &[("item1", 10.0)])], vec![]);
        let before = store.current();

        let ok = store.splice_seller("XX", source("New Cards", "XX", &[("item9", 1.0)]));
        assert!(!ok);

        let after = store.current();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn reader_keeps_coherent_view_across_publish() {
        let store = CatalogStore::new();
        store.publish(vec![source("Alpha Cards", "AC", &[("item1", 10.0)])], vec![]);

        let held = store.current();
        store.publish(vec![source("Alpha Cards", "AC", &[("item1", 99.0)])], vec![]);

        // The previously fetched generation is unchanged
        assert_eq!(
            held.find_seller("AC").unwrap().snapshot.get("item1").unwrap()[0].price,
            10.0
        );
        assert_eq!(
            store
                .current()
                .find_seller("AC")
                .unwrap()
                .snapshot
                .get("item1")
                .unwrap()[0]
                .price,
            99.0
        );
    }

    #[test]
    fn ready_flag_is_one_way() {
        let store = CatalogStore::new();
        assert!(!store.is_ready());
        store.mark_ready();
        assert!(store.is_ready());
        store.mark_ready();
        assert!(store.is_ready());
    }

    #[test]
    fn recompute_stats_counts_unique_items() {
        let store = CatalogStore::new();
        store.publish(
            vec![
                source("Alpha Cards", "AC", &[("item1", 10.0), ("item2", 4.0)]),
                source("Beta Cards", "BC", &[("item1", 9.5)]),
            ],
            vec![source("Alpha Buylist", "AB", &[("item3", 2.0)])],
        );

        let stats = store.recompute_stats();
        assert_eq!(stats.sellers, 2);
        assert_eq!(stats.vendors, 1);
        assert_eq!(stats.unique_items, 3);
        assert_eq!(stats.total_listings, 4);
    }

    #[test]
    fn publish_stamps_last_update() {
        let store = CatalogStore::new();
        assert!(store.last_update().is_none());
        store.publish(vec![source("Alpha Cards", "AC", &[])], vec![]);
        assert!(store.last_update().is_some());
    }
}
