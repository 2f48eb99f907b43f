//! Source registry: the directory of configured sources and the
//! per-source busy guard
//!
//! The busy flag is a single atomic compare-and-swap state machine
//! (idle -> busy -> idle). Acquiring it yields a guard that releases the
//! flag when dropped, so every exit path of a refresh, including panics,
//! clears the flag.

use crate::error::{Result, SyncError};
use crate::source::SourceDescriptor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// One registered source plus its refresh synchronization state
pub struct SourceHandle {
    pub descriptor: SourceDescriptor,
    busy: AtomicBool,
}

impl SourceHandle {
    fn new(descriptor: SourceDescriptor) -> Self {
        Self {
            descriptor,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Holds a source's busy flag for the duration of one refresh
pub struct RefreshGuard {
    handle: Arc<SourceHandle>,
}

impl RefreshGuard {
    pub fn handle(&self) -> &Arc<SourceHandle> {
        &self.handle
    }
}

impl std::fmt::Debug for RefreshGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("source", &self.handle.descriptor.shorthand)
            .finish()
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.handle.busy.store(false, Ordering::Release);
    }
}

/// Directory of configured sources, keyed by shorthand
///
/// Keeper names are registered as aliases pointing at their market source,
/// so a refresh requested for a keeper locks the whole market.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Arc<SourceHandle>>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source; keepers become aliases for the market's shorthand
    pub fn register(&self, descriptor: SourceDescriptor) {
        let shorthand = descriptor.shorthand.clone();

        let mut aliases = self.aliases.write().unwrap();
        for keeper in &descriptor.keepers {
            aliases.insert(keeper.clone(), shorthand.clone());
        }
        drop(aliases);

        let handle = Arc::new(SourceHandle::new(descriptor));
        self.sources.write().unwrap().insert(shorthand, handle);
    }

    /// Resolve a shorthand or keeper alias to its handle
    pub fn lookup(&self, code: &str) -> Option<Arc<SourceHandle>> {
        let sources = self.sources.read().unwrap();
        if let Some(handle) = sources.get(code) {
            return Some(Arc::clone(handle));
        }

        let aliases = self.aliases.read().unwrap();
        let target = aliases.get(code)?;
        sources.get(target).map(Arc::clone)
    }

    /// Atomically flip a source from idle to busy
    ///
    /// Fails fast with `AlreadyRefreshing` if another refresh holds the
    /// flag; the caller must not proceed and must not retry.
    pub fn try_begin_refresh(&self, code: &str) -> Result<RefreshGuard> {
        let handle = self
            .lookup(code)
            .ok_or_else(|| SyncError::UnknownSource(code.to_string()))?;

        handle
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::AlreadyRefreshing(handle.descriptor.shorthand.clone()))?;

        Ok(RefreshGuard { handle })
    }

    /// Whether a refresh of this source is currently in flight
    pub fn is_busy(&self, code: &str) -> bool {
        self.lookup(code).map(|h| h.is_busy()).unwrap_or(false)
    }

    /// Shorthands of every registered source, in registration-independent order
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.sources.read().unwrap().keys().cloned().collect();
        codes.sort();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Initializer, SourceAdapter};
    use crate::listing::SourceInfo;

    struct NullAdapter {
        info: SourceInfo,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for NullAdapter {
        fn info(&self) -> &SourceInfo {
            &self.info
        }
    }

    fn null_init(name: &str, shorthand: &str) -> Initializer {
        let info = SourceInfo {
            name: name.to_string(),
            shorthand: shorthand.to_string(),
            sell_side: true,
            buy_side: true,
            sealed: false,
            inventory_timestamp: None,
            buylist_timestamp: None,
        };
        Box::new(move || {
            Ok(Box::new(NullAdapter { info: info.clone() }) as Box<dyn SourceAdapter>)
        })
    }

    fn descriptor(name: &str, shorthand: &str) -> SourceDescriptor {
        SourceDescriptor::new(name, shorthand, null_init(name, shorthand))
    }

    #[test]
    fn register_and_lookup() {
        let registry = SourceRegistry::new();
        registry.register(descriptor("Example Cards", "EX"));

        assert!(registry.lookup("EX").is_some());
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn second_begin_refresh_fails_fast() {
        let registry = SourceRegistry::new();
        registry.register(descriptor("Example Cards", "EX"));

        let guard = registry.try_begin_refresh("EX").unwrap();
        assert!(registry.is_busy("EX"));

        let err = registry.try_begin_refresh("EX").unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRefreshing(_)));

        drop(guard);
        assert!(!registry.is_busy("EX"));
        // Released flag can be re-acquired
        assert!(registry.try_begin_refresh("EX").is_ok());
    }

    #[test]
    fn unknown_source_is_reported() {
        let registry = SourceRegistry::new();
        let err = registry.try_begin_refresh("nope").unwrap_err();
        assert!(matches!(err, SyncError::UnknownSource(_)));
    }

    #[test]
    fn keeper_alias_locks_the_market() {
        let registry = SourceRegistry::new();
        let mut desc = descriptor("Big Market", "BM");
        desc.keepers = vec!["Market Low".to_string(), "Market Trend".to_string()];
        registry.register(desc);

        let guard = registry.try_begin_refresh("Market Low").unwrap();
        // Busy is visible under the market shorthand and every alias
        assert!(registry.is_busy("BM"));
        assert!(registry.is_busy("Market Trend"));
        drop(guard);
        assert!(!registry.is_busy("BM"));
    }

    #[test]
    fn guard_releases_on_panic() {
        let registry = Arc::new(SourceRegistry::new());
        registry.register(descriptor("Example Cards", "EX"));

        let reg = Arc::clone(&registry);
        let result = std::thread::spawn(move || {
            let _guard = reg.try_begin_refresh("EX").unwrap();
            panic!("scraper blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!registry.is_busy("EX"));
    }

    #[test]
    fn concurrent_begin_refresh_admits_exactly_one() {
        use std::sync::Barrier;

        let registry = Arc::new(SourceRegistry::new());
        registry.register(descriptor("Example Cards", "EX"));
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                match reg.try_begin_refresh("EX") {
                    Ok(guard) => {
                        // Hold long enough that every sibling has attempted
                        std::thread::sleep(std::time::Duration::from_millis(200));
                        drop(guard);
                        true
                    }
                    Err(_) => false,
                }
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
