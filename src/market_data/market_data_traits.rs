use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::errors::Result;

use super::market_data_model::{
    CacheStats, CatalogItem, NewSnapshotRow, PriceMap, SnapshotRow, Timeframe, VolumeSnapshot,
};

/// Read/refresh surface of the synchronization cache. Reads never block on a
/// refresh; they serve the last committed snapshot.
#[async_trait]
pub trait PriceSyncServiceTrait: Send + Sync {
    /// Serve the current price map, refreshing first when the snapshot is
    /// older than the fetch interval. A refresh already in flight is skipped.
    async fn get_prices(&self) -> Result<PriceMap>;

    /// Price map filtered to the given items. Missing items are absent from
    /// the result, not zeroed.
    async fn get_item_prices(&self, item_ids: &[i32]) -> Result<PriceMap>;

    /// Run one refresh cycle now (scheduler entry point).
    async fn refresh(&self) -> Result<()>;

    /// Highest-volume items from the most recent snapshots.
    fn high_volume_items(&self, limit: i64) -> Result<Vec<SnapshotRow>>;

    fn cache_stats(&self) -> Result<CacheStats>;
}

pub trait MarketDataRepositoryTrait: Send + Sync {
    /// Append snapshot rows in bounded batches. Returns the number of rows
    /// actually persisted; a failed batch is logged and skipped.
    fn save_snapshot_rows(&self, rows: &[NewSnapshotRow]) -> Result<usize>;

    /// Most recent row per item with the given timeframe tag, no older than
    /// the freshness window.
    fn get_latest_prices(&self, timeframe: Timeframe, freshness: Duration) -> Result<PriceMap>;

    fn get_high_volume_items(&self, limit: i64) -> Result<Vec<SnapshotRow>>;

    /// `(unique_items, total_records, last_update)` over a lookback window.
    fn snapshot_stats(&self, lookback: Duration) -> Result<(usize, usize, Option<NaiveDateTime>)>;

    fn upsert_daily_volumes(&self, snapshot: &HashMap<i32, VolumeSnapshot>) -> Result<usize>;

    fn upsert_hourly_volumes(&self, snapshot: &HashMap<i32, VolumeSnapshot>) -> Result<usize>;

    fn upsert_catalog(&self, items: &[CatalogItem]) -> Result<usize>;
}
