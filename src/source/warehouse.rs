//! Bulk warehouse adapter
//!
//! Reads listing rows from bulk-export SQLite tables. Rows are decoded
//! through a fixed set of known column names mapped to typed setters;
//! a table carrying a column the decoder does not know is rejected
//! loudly instead of silently dropping data.

use crate::error::{Result, SyncError};
use crate::listing::{Listing, Snapshot, SourceInfo};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::PathBuf;

/// Columns carried through verbatim as source-specific custom fields
const CUSTOM_COLUMNS: &[&str] = &["sku", "edition", "language", "finish", "title"];

/// Warehouse-query source reading whole tables of listing rows
pub struct WarehouseSource {
    info: SourceInfo,
    db_path: PathBuf,
    inventory_table: Option<String>,
    buylist_table: Option<String>,
}

impl WarehouseSource {
    pub fn new(
        info: SourceInfo,
        db_path: impl Into<PathBuf>,
        inventory_table: Option<String>,
        buylist_table: Option<String>,
    ) -> Self {
        Self {
            info,
            db_path: db_path.into(),
            inventory_table,
            buylist_table,
        }
    }

    fn load_table(&self, table: &str, buy_side: bool) -> Result<Snapshot> {
        validate_table_name(table)?;

        let conn = Connection::open(&self.db_path)?;
        // rowid order preserves the provider's ranking within each item
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", table))?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        let mut snapshot = Snapshot::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut item_id: Option<String> = None;
            let mut listing = Listing::new(0.0, 0);

            for (i, column) in columns.iter().enumerate() {
                match column.as_str() {
                    "item_id" => item_id = row.get(i)?,
                    "conditions" => {
                        if let Some(value) = row.get::<_, Option<String>>(i)? {
                            listing.conditions = value;
                        }
                    }
                    "price" => {
                        if !buy_side {
                            if let Some(value) = row.get::<_, Option<f64>>(i)? {
                                listing.price = value;
                            }
                        }
                    }
                    "buy_price" => {
                        if buy_side {
                            if let Some(value) = row.get::<_, Option<f64>>(i)? {
                                listing.price = value;
                            }
                        }
                    }
                    "trade_price" => listing.trade_price = row.get(i)?,
                    "price_ratio" => listing.price_ratio = row.get(i)?,
                    "quantity" => {
                        if let Some(value) = row.get::<_, Option<i64>>(i)? {
                            listing.quantity = value.max(0) as u32;
                        }
                    }
                    "url" => {
                        if let Some(value) = row.get::<_, Option<String>>(i)? {
                            listing.url = value;
                        }
                    }
                    "seller" => listing.seller = row.get(i)?,
                    name if CUSTOM_COLUMNS.contains(&name) => {
                        if let Some(value) = row.get::<_, Option<String>>(i)? {
                            listing.custom_fields.insert(name.to_string(), value);
                        }
                    }
                    other => return Err(SyncError::UnknownColumn(other.to_string())),
                }
            }

            let Some(item_id) = item_id else {
                log::warn!("Row without item_id in table {}, skipping", table);
                continue;
            };
            snapshot.add(&item_id, listing);
        }

        log::info!(
            "Loaded {} items from table {} for {}",
            snapshot.len(),
            table,
            self.info.shorthand
        );
        Ok(snapshot)
    }
}

/// Table names come from configuration; only identifier characters are
/// allowed since they are interpolated into the query text
fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(SyncError::UnknownSource(format!("bad table name: {table}")));
    }
    Ok(())
}

#[async_trait]
impl SourceAdapter for WarehouseSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    async fn inventory(&self) -> Result<Snapshot> {
        let table = self
            .inventory_table
            .clone()
            .ok_or_else(|| SyncError::EmptySnapshot(self.info.shorthand.clone()))?;
        self.load_table(&table, false)
    }

    async fn buylist(&self) -> Result<Snapshot> {
        let table = self
            .buylist_table
            .clone()
            .ok_or_else(|| SyncError::EmptySnapshot(self.info.shorthand.clone()))?;
        self.load_table(&table, true)
    }
}
