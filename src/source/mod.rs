//! Source adapters: the uniform capability every upstream provider exposes
//!
//! An adapter produces inventory and/or buylist snapshots for one provider.
//! Adapters are built fresh for every refresh through the descriptor's
//! initializer and never reused across cycles (stale connections, stale
//! auth tokens).

pub mod http;
pub mod warehouse;

use crate::error::{Result, SyncError};
use crate::listing::{Snapshot, SourceInfo};
use async_trait::async_trait;
use std::time::Duration;

/// Default bound on a single acquisition call
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// A ready-to-use connection to one upstream provider
///
/// Implementations may be arbitrarily slow and may fail; the engine treats
/// every call as an opaque, bounded-timeout operation.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn info(&self) -> &SourceInfo;

    /// Produce a full sell-side snapshot
    async fn inventory(&self) -> Result<Snapshot> {
        Err(SyncError::EmptySnapshot(self.info().shorthand.clone()))
    }

    /// Produce a full buy-side snapshot
    async fn buylist(&self) -> Result<Snapshot> {
        Err(SyncError::EmptySnapshot(self.info().shorthand.clone()))
    }
}

/// Allocates and initializes a fresh adapter for one refresh cycle
pub type Initializer = Box<dyn Fn() -> Result<Box<dyn SourceAdapter>> + Send + Sync>;

/// Configuration for one upstream provider: identity, capability flags,
/// keeper list for market sources, and the initializer
pub struct SourceDescriptor {
    pub name: String,
    pub shorthand: String,
    /// Provider publishes retail inventory
    pub sell_side: bool,
    /// Provider publishes a buylist
    pub buy_side: bool,
    /// Provider deals in bundled product
    pub sealed: bool,
    /// Sub-sellers to keep when decomposing a market snapshot;
    /// empty for plain sources
    pub keepers: Vec<String>,
    /// Mirror daily price points into the historical store
    pub record_history: bool,
    /// Bound on each acquisition call
    pub timeout: Duration,
    init: Initializer,
}

impl SourceDescriptor {
    pub fn new(name: &str, shorthand: &str, init: Initializer) -> Self {
        Self {
            name: name.to_string(),
            shorthand: shorthand.to_string(),
            sell_side: true,
            buy_side: true,
            sealed: false,
            keepers: Vec::new(),
            record_history: false,
            timeout: DEFAULT_FETCH_TIMEOUT,
            init,
        }
    }

    /// Allocate a fresh adapter for one refresh cycle
    pub fn init(&self) -> Result<Box<dyn SourceAdapter>> {
        (self.init)()
    }

    /// Market sources decompose into keeper sub-sources
    pub fn is_market(&self) -> bool {
        !self.keepers.is_empty()
    }

    /// Metadata as published alongside this source's snapshots
    pub fn info(&self) -> SourceInfo {
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
}

impl std::fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("shorthand", &self.shorthand)
            .field("sell_side", &self.sell_side)
            .field("buy_side", &self.buy_side)
            .field("keepers", &self.keepers)
            .finish()
    }
}
