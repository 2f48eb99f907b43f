//! Catalog Sync - Live Price Catalog Engine
//!
//! Keeps a process-wide catalog of buy/sell price listings fresh across
//! many independent upstream providers. Sources are fetched concurrently
//! with per-source failure isolation; every publication is an atomic swap
//! so readers always see a complete, self-consistent view.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod listing;
pub mod notify;
pub mod registry;
pub mod source;

pub use cache::{RemoteMirror, Side, SnapshotCache};
pub use catalog::{CatalogGeneration, CatalogStats, CatalogStore};
pub use config::{AppConfig, SourceConfig};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use history::HistoricalStore;
pub use listing::{Listing, Snapshot, SourceData, SourceInfo};
pub use notify::{LogNotifier, Notifier};
pub use registry::SourceRegistry;
pub use source::{SourceAdapter, SourceDescriptor};
