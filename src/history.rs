//! Historical price store
//!
//! A time-series of daily price points keyed by (item id, date), written
//! by the bulk synchronizer and read by charting and reporting features.
//! It has no consistency coupling with the catalog: a failed write here
//! never blocks publication.

use crate::error::Result;
use crate::listing::SourceData;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Scale for converting non-NM headline prices to NM equivalents
fn grade_multiplier(conditions: &str) -> f64 {
    match conditions {
        "NM" => 1.0,
        "SP" => 1.25,
        "MP" => 1.67,
        "HP" => 2.5,
        "PO" => 4.0,
        _ => 1.0,
    }
}

/// SQLite-backed daily price time-series
pub struct HistoricalStore {
    conn: Mutex<Connection>,
}

impl HistoricalStore {
    /// Open (or create) the store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            -- One price point per item per day
            CREATE TABLE IF NOT EXISTS price_points (
                item_id TEXT NOT NULL,
                price_date TEXT NOT NULL,
                price REAL NOT NULL,
                PRIMARY KEY (item_id, price_date)
            );

            CREATE INDEX IF NOT EXISTS idx_price_points_date ON price_points(price_date);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append or overwrite one price point
    pub fn record(&self, item_id: &str, date: &str, price: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO price_points (item_id, price_date, price)
             VALUES (?1, ?2, ?3)",
            params![item_id, date, price],
        )?;
        Ok(())
    }

    /// Record only if no point exists yet for this (item, date)
    ///
    /// Used for derived prices that should not clobber a value written
    /// from more accurate information earlier in the day.
    pub fn record_if_absent(&self, item_id: &str, date: &str, price: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO price_points (item_id, price_date, price)
             VALUES (?1, ?2, ?3)",
            params![item_id, date, price],
        )?;
        Ok(())
    }

    /// All dated points for one item, oldest first
    pub fn fetch_series(&self, item_id: &str) -> Result<BTreeMap<String, f64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT price_date, price FROM price_points
             WHERE item_id = ?1
             ORDER BY price_date ASC",
        )?;

        let mut series = BTreeMap::new();
        let rows = stmt.query_map(params![item_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (date, price) = row?;
            series.insert(date, price);
        }
        Ok(series)
    }

    /// Item ids matching a SQL LIKE pattern, for bulk export
    pub fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT item_id FROM price_points
             WHERE item_id LIKE ?1
             ORDER BY item_id",
        )?;

        let rows = stmt.query_map(params![pattern], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// Mirror a snapshot's headline prices into the store
    ///
    /// Writes each item's first listing price, scaled to NM through the
    /// grade map. `overwrite` selects HSet-vs-HSetNX semantics: buylist
    /// prices overwrite, derived inventory prices only fill gaps.
    pub fn record_headline_prices(
        &self,
        data: &SourceData,
        date: &str,
        overwrite: bool,
    ) -> Result<usize> {
        let mut written = 0;
        for (item_id, listings) in &data.snapshot.records {
            let Some(first) = listings.first() else {
                continue;
            };
            let price = first.price * grade_multiplier(&first.conditions);
            if price == 0.0 {
                continue;
            }

            if overwrite {
                self.record(item_id, date, price)?;
            } else {
                self.record_if_absent(item_id, date, price)?;
            }
            written += 1;
        }
        Ok(written)
    }
}

/// Today's date key as YYYY-MM-DD (UTC)
pub fn today_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Listing, Snapshot, SourceInfo};

    fn store() -> HistoricalStore {
        HistoricalStore::open_in_memory().unwrap()
    }

    #[test]
    fn record_and_fetch_series() {
        let store = store();
        store.record("item1", "2026-08-01", 10.0).unwrap();
        store.record("item1", "2026-08-02", 11.0).unwrap();
        store.record("item2", "2026-08-01", 3.0).unwrap();

        let series = store.fetch_series("item1").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series["2026-08-01"], 10.0);
        assert_eq!(series["2026-08-02"], 11.0);
    }

    #[test]
    fn record_overwrites_same_date() {
        let store = store();
        store.record("item1", "2026-08-01", 10.0).unwrap();
        store.record("item1", "2026-08-01", 12.0).unwrap();

        let series = store.fetch_series("item1").unwrap();
        assert_eq!(series["2026-08-01"], 12.0);
    }

    #[test]
    fn record_if_absent_keeps_first_value() {
        let store = store();
        store.record_if_absent("item1", "2026-08-01", 10.0).unwrap();
        store.record_if_absent("item1", "2026-08-01", 12.0).unwrap();

        let series = store.fetch_series("item1").unwrap();
        assert_eq!(series["2026-08-01"], 10.0);
    }

    #[test]
    fn scan_matches_pattern() {
        let store = store();
        store.record("abc-1", "2026-08-01", 1.0).unwrap();
        store.record("abc-2", "2026-08-01", 2.0).unwrap();
        store.record("xyz-1", "2026-08-01", 3.0).unwrap();

        let keys = store.scan("abc-%").unwrap();
        assert_eq!(keys, vec!["abc-1", "abc-2"]);
    }

    #[test]
    fn headline_prices_scale_to_nm() {
        let store = store();

        let mut snapshot = Snapshot::new();
        let mut played = Listing::new(10.0, 1);
        played.conditions = "MP".to_string();
        snapshot.add("item1", played);
        snapshot.add("item1", Listing::new(99.0, 1)); // ranked second, ignored
        snapshot.add("item2", Listing::new(0.0, 1)); // zero prices are skipped

        let info = SourceInfo {
            name: "Example Cards".to_string(),
            shorthand: "EX".to_string(),
            sell_side: true,
            buy_side: false,
            sealed: false,
            inventory_timestamp: None,
            buylist_timestamp: None,
        };
        let data = SourceData::new(info, snapshot);

        let written = store
            .record_headline_prices(&data, "2026-08-01", false)
            .unwrap();
        assert_eq!(written, 1);

        let series = store.fetch_series("item1").unwrap();
        assert!((series["2026-08-01"] - 16.7).abs() < 0.001);
    }
}
