//! Catalog Sync - Live Price Catalog Engine
//!
//! Loads the configured source roster, restores the catalog from cache,
//! and keeps it fresh with scheduled full-catalog sync cycles.

use catalog_sync::{
    AppConfig, HistoricalStore, RemoteMirror, SnapshotCache, SyncEngine,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Price catalog sync server - keeps the listing catalog fresh
#[derive(Parser, Debug)]
#[command(name = "catalog_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Directory for cached snapshots
    #[arg(long, default_value_t = default_cache_dir())]
    cache_dir: String,

    /// Run one sync cycle and exit (default: run continuously)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Full sync interval in hours when running continuously
    #[arg(long, default_value_t = 24)]
    interval_hours: u64,
}

/// Returns the default cache path: ~/.local/share/catalog_sync/cache
fn default_cache_dir() -> String {
    SnapshotCache::default_root().to_string_lossy().to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    log::info!("Starting catalog_sync...");
    log::info!("Config path: {}", args.config);

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = SyncEngine::new(SnapshotCache::new(PathBuf::from(&args.cache_dir)));

    if let Some(url) = &config.mirror_url {
        log::info!("Mirroring snapshots to {}", url);
        engine = engine.with_mirror(RemoteMirror::new(url));
    }

    if let Some(path) = &config.history_db {
        match HistoricalStore::open(path) {
            Ok(history) => {
                log::info!("Recording price history to {}", path.display());
                engine = engine.with_history(history);
            }
            Err(e) => {
                log::error!("Failed to open history database: {}", e);
                std::process::exit(1);
            }
        }
    }

    let engine = Arc::new(engine);
    for source in &config.sources {
        log::info!("Registering {} ({})", source.name, source.shorthand);
        engine.register(source.descriptor());
    }

    // Fast cold start from the snapshot cache, if one exists
    let (sellers, vendors) = engine.startup();
    log::info!(
        "Cold start loaded {} sellers and {} vendors from cache",
        sellers,
        vendors
    );

    if args.once {
        run_cycle(&engine).await;
    } else {
        log::info!(
            "Running in daemon mode, full sync every {} hour(s)",
            args.interval_hours
        );
        run_daemon(&engine, args.interval_hours).await;
    }
}

/// Run the sync daemon - the engine never retries on its own, this loop
/// is the retry cadence
async fn run_daemon(engine: &Arc<SyncEngine>, interval_hours: u64) {
    let mut ticker = interval(Duration::from_secs(interval_hours * 3600));

    loop {
        ticker.tick().await;
        run_cycle(engine).await;
    }
}

/// Run a single full sync cycle
async fn run_cycle(engine: &Arc<SyncEngine>) {
    match engine.sync_all().await {
        Ok(stats) => {
            log::info!(
                "Sync completed: {} sellers, {} vendors, {} unique items, {} listings",
                stats.sellers,
                stats.vendors,
                stats.unique_items,
                stats.total_listings
            );
        }
        Err(e) => {
            log::error!("Sync cycle failed: {}", e);
        }
    }
}
