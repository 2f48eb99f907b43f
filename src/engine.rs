//! The sync engine: single-source refresh orchestration and full-catalog
//! bulk cycles
//!
//! All publication goes through the catalog store's swap operations;
//! per-source failures are contained at the task boundary and never
//! propagate past it. Retrying is the scheduler's job, not the engine's.

use crate::cache::{RemoteMirror, Side, SnapshotCache};
use crate::catalog::{CatalogGeneration, CatalogStats, CatalogStore};
use crate::error::{Result, SyncError};
use crate::history::{today_date, HistoricalStore};
use crate::listing::{Snapshot, SourceData, SourceInfo};
use crate::notify::{LogNotifier, Notifier};
use crate::registry::SourceRegistry;
use crate::source::{SourceAdapter, SourceDescriptor};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// A source whose data is younger than this is not re-fetched by a bulk
/// cycle; its current entry is carried forward instead
pub const SKIP_REFRESH_COOLDOWN: Duration = Duration::from_secs(2 * 3600);

/// Catalog synchronization engine
///
/// Owns the source registry, the catalog store, and the caches. The rest
/// of the application interacts with it only through the operational
/// triggers: `refresh_source`, `sync_all`, `is_busy`, `catalog_ready`,
/// `current_generation`.
pub struct SyncEngine {
    registry: SourceRegistry,
    catalog: CatalogStore,
    cache: SnapshotCache,
    mirror: Option<Arc<RemoteMirror>>,
    history: Option<Arc<HistoricalStore>>,
    notifier: Arc<dyn Notifier>,
    cooldown: Duration,
}

impl SyncEngine {
    pub fn new(cache: SnapshotCache) -> Self {
        Self {
            registry: SourceRegistry::new(),
            catalog: CatalogStore::new(),
            cache,
            mirror: None,
            history: None,
            notifier: Arc::new(LogNotifier),
            cooldown: SKIP_REFRESH_COOLDOWN,
        }
    }

    pub fn with_mirror(mut self, mirror: RemoteMirror) -> Self {
        self.mirror = Some(Arc::new(mirror));
        self
    }

    pub fn with_history(mut self, history: HistoricalStore) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Add a source to the roster
    pub fn register(&self, descriptor: SourceDescriptor) {
        self.registry.register(descriptor);
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    // ── Operational triggers ───────────────────────────────────────────

    /// Whether a refresh of this source is currently in flight
    pub fn is_busy(&self, code: &str) -> bool {
        self.registry.is_busy(code)
    }

    /// Whether the first successful cycle (or cold-start load) completed
    pub fn catalog_ready(&self) -> bool {
        self.catalog.is_ready()
    }

    /// The currently published generation
    pub fn current_generation(&self) -> Arc<CatalogGeneration> {
        self.catalog.current()
    }

    /// Populate the catalog from the snapshot cache before the first
    /// bulk cycle, so readers never see an empty catalog after a cold
    /// start if a prior cache exists
    ///
    /// Returns the number of sellers and vendors loaded.
    pub fn startup(&self) -> (usize, usize) {
        let sellers = self.cache.load_all(Side::Inventory);
        let vendors = self.cache.load_all(Side::Buylist);
        let counts = (sellers.len(), vendors.len());

        if counts.0 > 0 || counts.1 > 0 {
            self.catalog.publish(sellers, vendors);
            self.catalog.recompute_stats();
        }
        if counts.0 > 0 && counts.1 > 0 {
            self.catalog.mark_ready();
            self.notifier.notify(
                "init",
                &format!(
                    "catalog loaded from cache with {} sellers and {} vendors",
                    counts.0, counts.1
                ),
            );
        }
        counts
    }

    /// Refresh one source end-to-end: acquire, validate, splice, notify
    ///
    /// Fails fast if a refresh of this source is already in flight. A
    /// failed or empty acquisition leaves the previous data visible.
    /// Splices only entries already present in the current generation;
    /// the set of visible sources changes only through `sync_all`.
    pub async fn refresh_source(&self, code: &str) -> Result<()> {
        let guard = self.registry.try_begin_refresh(code)?;
        let descriptor = &guard.handle().descriptor;
        let shorthand = descriptor.shorthand.clone();

        self.notifier
            .notify("refresh", &format!("Reloading {}", shorthand));

        let adapter = match descriptor.init() {
            Ok(adapter) => adapter,
            Err(e) => {
                self.notifier.alert(
                    "refresh",
                    &format!("error initializing {}: {}", shorthand, e),
                );
                return Err(e);
            }
        };

        let mut attempted = 0;
        let mut succeeded = 0;
        let mut last_err = None;

        if descriptor.sell_side {
            attempted += 1;
            match self
                .fetch_side(adapter.as_ref(), descriptor, Side::Inventory)
                .await
            {
                Ok(snapshot) => {
                    self.splice_inventory(descriptor, snapshot);
                    succeeded += 1;
                }
                Err(e) => {
                    self.notifier.alert(
                        "refresh",
                        &format!("seller {} {} - {}", descriptor.name, shorthand, e),
                    );
                    last_err = Some(e);
                }
            }
        }

        if descriptor.buy_side {
            attempted += 1;
            match self
                .fetch_side(adapter.as_ref(), descriptor, Side::Buylist)
                .await
            {
                Ok(snapshot) => {
                    let data = SourceData::new(
                        stamped_info(descriptor.info(), Side::Buylist),
                        snapshot,
                    );
                    if self.catalog.splice_vendor(&shorthand, data.clone()) {
                        self.persist(Side::Buylist, &data, descriptor.record_history);
                    } else {
                        log::info!("{} not in current buylist generation, skipping", shorthand);
                    }
                    succeeded += 1;
                }
                Err(e) => {
                    self.notifier.alert(
                        "refresh",
                        &format!("vendor {} {} - {}", descriptor.name, shorthand, e),
                    );
                    last_err = Some(e);
                }
            }
        }

        if attempted > 0 && succeeded == 0 {
            return Err(last_err.unwrap_or(SyncError::EmptySnapshot(shorthand)));
        }

        self.notifier
            .notify("refresh", &format!("{} refresh completed", descriptor.name));
        Ok(())
    }

    /// Full-catalog refresh across every configured source
    ///
    /// One task per source, each acquisition bounded by the source's
    /// timeout. A source's busy guard is taken once and spans both of
    /// its sides, so the sides of one source never contend with each
    /// other, only with single-source refreshes. A failing source costs
    /// only its own entry; the cycle publishes whatever succeeded plus
    /// carried-forward previous data. If either side ends up empty the
    /// cycle is abandoned and the previous generation stays live.
    pub async fn sync_all(self: &Arc<Self>) -> Result<CatalogStats> {
        let first_cycle = !self.catalog.is_ready();
        let channel = if first_cycle { "init" } else { "refresh" };
        self.notifier.notify(
            channel,
            if first_cycle {
                "loading started"
            } else {
                "full refresh started"
            },
        );

        let codes = self.registry.codes();
        let mut handles = Vec::with_capacity(codes.len());
        for code in codes {
            let engine = Arc::clone(self);
            let task_code = code.clone();
            handles.push((
                code,
                tokio::spawn(async move { engine.sync_source(&task_code).await }),
            ));
        }

        let mut sellers = Vec::new();
        let mut vendors = Vec::new();
        for (code, handle) in handles {
            match handle.await {
                Ok((mut s, mut v)) => {
                    sellers.append(&mut s);
                    vendors.append(&mut v);
                }
                Err(e) => {
                    // Task panicked; treat like any other per-source failure
                    self.notifier.alert("panic", &format!("{} - {}", code, e));
                    self.carry_forward(&code, Side::Inventory, &mut sellers);
                    self.carry_forward(&code, Side::Buylist, &mut vendors);
                }
            }
        }

        if sellers.is_empty() || vendors.is_empty() {
            self.notifier
                .alert(channel, "nothing got loaded, keeping previous generation");
            return Err(SyncError::CycleAbandoned("empty candidate list"));
        }

        self.catalog.publish(sellers, vendors);
        self.catalog.mark_ready();
        let stats = self.catalog.recompute_stats();

        self.notifier.notify(
            channel,
            &format!(
                "cycle completed: {} sellers, {} vendors, {} unique items",
                stats.sellers, stats.vendors, stats.unique_items
            ),
        );
        Ok(stats)
    }

    // ── Bulk cycle internals ───────────────────────────────────────────

    /// Acquire one source's snapshots for a bulk cycle, both sides under
    /// one busy-guard acquisition
    ///
    /// Failures are alerted and resolved to carried-forward entries
    /// here, per side, so the caller only merges candidate lists.
    async fn sync_source(&self, code: &str) -> (Vec<SourceData>, Vec<SourceData>) {
        let mut sellers = Vec::new();
        let mut vendors = Vec::new();
        let Some(handle) = self.registry.lookup(code) else {
            return (sellers, vendors);
        };
        let descriptor = &handle.descriptor;

        let mut pending = Vec::new();
        for side in [Side::Inventory, Side::Buylist] {
            let applies = match side {
                Side::Inventory => descriptor.sell_side,
                Side::Buylist => descriptor.buy_side,
            };
            if !applies {
                continue;
            }
            if let Some(carried) = self.fresh_entries(descriptor, side) {
                log::info!(
                    "Skipping {} {} because too recent",
                    descriptor.name,
                    side.dir()
                );
                match side {
                    Side::Inventory => sellers.extend(carried),
                    Side::Buylist => vendors.extend(carried),
                }
            } else {
                pending.push(side);
            }
        }
        if pending.is_empty() {
            return (sellers, vendors);
        }

        // Same lock discipline as single-source refreshes, taken once
        // for both sides. A busy source misses this cycle and its
        // previous entries are carried forward.
        let setup = self
            .registry
            .try_begin_refresh(code)
            .and_then(|guard| Ok((guard, descriptor.init()?)));
        let (_guard, adapter) = match setup {
            Ok(pair) => pair,
            Err(e) => {
                self.notifier.alert("refresh", &format!("{} - {}", code, e));
                for side in pending {
                    match side {
                        Side::Inventory => self.carry_forward(code, side, &mut sellers),
                        Side::Buylist => self.carry_forward(code, side, &mut vendors),
                    }
                }
                return (sellers, vendors);
            }
        };

        for side in pending {
            match self.fetch_side(adapter.as_ref(), descriptor, side).await {
                Ok(snapshot) => {
                    let datas = self.decompose(descriptor, side, snapshot);
                    for data in &datas {
                        self.persist(side, data, descriptor.record_history);
                    }
                    match side {
                        Side::Inventory => sellers.extend(datas),
                        Side::Buylist => vendors.extend(datas),
                    }
                }
                Err(e) => {
                    self.notifier
                        .alert("refresh", &format!("{} {} - {}", side.dir(), code, e));
                    match side {
                        Side::Inventory => self.carry_forward(code, side, &mut sellers),
                        Side::Buylist => self.carry_forward(code, side, &mut vendors),
                    }
                }
            }
        }
        (sellers, vendors)
    }

    /// Split a market snapshot into keeper entries, or wrap a plain one
    fn decompose(
        &self,
        descriptor: &SourceDescriptor,
        side: Side,
        snapshot: Snapshot,
    ) -> Vec<SourceData> {
        if !descriptor.is_market() || side == Side::Buylist {
            let info = stamped_info(descriptor.info(), side);
            return vec![SourceData::new(info, snapshot)];
        }

        let mut out = Vec::new();
        for (keeper, sub) in snapshot.split_sellers(&descriptor.keepers) {
            if sub.is_empty() {
                log::warn!("Keeper {} produced no listings, skipping", keeper);
                continue;
            }
            let info = stamped_info(descriptor.info().for_keeper(&keeper), side);
            out.push(SourceData::new(info, sub));
        }
        out
    }

    /// Current entries for this source if every expected one is younger
    /// than the cooldown
    fn fresh_entries(&self, descriptor: &SourceDescriptor, side: Side) -> Option<Vec<SourceData>> {
        if self.cooldown.is_zero() {
            return None;
        }

        let current = self.catalog.current();
        let mut carried = Vec::new();
        for code in expected_codes(descriptor, side) {
            let entry = match side {
                Side::Inventory => current.find_seller(&code)?,
                Side::Buylist => current.find_vendor(&code)?,
            };

            let stamp = match side {
                Side::Inventory => entry.info.inventory_timestamp?,
                Side::Buylist => entry.info.buylist_timestamp?,
            };
            let age = (Utc::now() - stamp).to_std().ok()?;
            if age >= self.cooldown {
                return None;
            }
            carried.push((**entry).clone());
        }
        Some(carried)
    }

    /// Copy a failed source's current entries into the candidate list so
    /// a bulk cycle never drops previously-published data
    ///
    /// Reads the generation at call time, so data spliced in by a
    /// refresh that completed mid-cycle is carried, not reverted.
    fn carry_forward(&self, code: &str, side: Side, out: &mut Vec<SourceData>) {
        let Some(handle) = self.registry.lookup(code) else {
            return;
        };
        let current = self.catalog.current();

        for expected in expected_codes(&handle.descriptor, side) {
            let entry = match side {
                Side::Inventory => current.find_seller(&expected),
                Side::Buylist => current.find_vendor(&expected),
            };
            if let Some(entry) = entry {
                log::info!("Carrying forward previous {} data for {}", side.dir(), expected);
                out.push((**entry).clone());
            }
        }
    }

    // ── Shared acquisition helpers ─────────────────────────────────────

    /// One bounded acquisition call; an empty snapshot is a failure
    async fn fetch_side(
        &self,
        adapter: &dyn SourceAdapter,
        descriptor: &SourceDescriptor,
        side: Side,
    ) -> Result<Snapshot> {
        let fetch = async {
            match side {
                Side::Inventory => adapter.inventory().await,
                Side::Buylist => adapter.buylist().await,
            }
        };

        let snapshot = tokio::time::timeout(descriptor.timeout, fetch)
            .await
            .map_err(|_| SyncError::Timeout(descriptor.shorthand.clone()))??;

        if snapshot.is_empty() {
            return Err(SyncError::EmptySnapshot(descriptor.shorthand.clone()));
        }
        Ok(snapshot)
    }

    /// Splice a refreshed inventory snapshot into the current generation
    fn splice_inventory(&self, descriptor: &SourceDescriptor, snapshot: Snapshot) {
        if !descriptor.is_market() {
            let data = SourceData::new(stamped_info(descriptor.info(), Side::Inventory), snapshot);
            if self.catalog.splice_seller(&descriptor.shorthand, data.clone()) {
                self.persist(Side::Inventory, &data, descriptor.record_history);
            } else {
                log::info!(
                    "{} not in current inventory generation, skipping",
                    descriptor.shorthand
                );
            }
            return;
        }

        // Market source: swap each keeper independently, but only keepers
        // already visible. New keepers appear only through a bulk cycle.
        for (keeper, sub) in snapshot.split_sellers(&descriptor.keepers) {
            if sub.is_empty() {
                log::warn!("Keeper {} produced no listings, keeping previous data", keeper);
                continue;
            }
            let info = stamped_info(descriptor.info().for_keeper(&keeper), Side::Inventory);
            let data = SourceData::new(info, sub);
            if self.catalog.splice_seller(&keeper, data.clone()) {
                self.persist(Side::Inventory, &data, descriptor.record_history);
            } else {
                log::info!("Keeper {} not in current generation, skipping", keeper);
            }
        }
    }

    /// Write a fresh snapshot to the cache, the remote mirror, and the
    /// historical store; none of these can fail the refresh
    fn persist(&self, side: Side, data: &SourceData, record_history: bool) {
        if let Err(e) = self.cache.store(side, data) {
            log::warn!("Failed to cache {} snapshot: {}", data.info.shorthand, e);
        }

        if let Some(mirror) = &self.mirror {
            let mirror = Arc::clone(mirror);
            let data = data.clone();
            tokio::spawn(async move {
                if let Err(e) = mirror.upload(side, &data).await {
                    log::warn!("Failed to mirror {} snapshot: {}", data.info.shorthand, e);
                }
            });
        }

        if record_history {
            if let Some(history) = &self.history {
                // Buylist prices overwrite; inventory prices only fill gaps
                let overwrite = side == Side::Buylist;
                match history.record_headline_prices(data, &today_date(), overwrite) {
                    Ok(written) => log::info!(
                        "Recorded {} price points for {}",
                        written,
                        data.info.shorthand
                    ),
                    Err(e) => {
                        self.notifier
                            .alert("history", &format!("{} - {}", data.info.shorthand, e));
                    }
                }
            }
        }
    }
}

/// Shorthands this source contributes to one side of the catalog
fn expected_codes(descriptor: &SourceDescriptor, side: Side) -> Vec<String> {
    if descriptor.is_market() && side == Side::Inventory {
        descriptor.keepers.clone()
    } else {
        vec![descriptor.shorthand.clone()]
    }
}

/// Stamp the capture time for the side just acquired
fn stamped_info(mut info: SourceInfo, side: Side) -> SourceInfo {
    let now = Utc::now();
    match side {
        Side::Inventory => info.inventory_timestamp = Some(now),
        Side::Buylist => info.buylist_timestamp = Some(now),
    }
    info
}
