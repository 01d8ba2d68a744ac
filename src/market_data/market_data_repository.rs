use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use log::error;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::{item_mapping, item_price_history, item_volumes};

use super::market_data_constants::{SNAPSHOT_BATCH_SIZE, VOLUME_UPSERT_CHUNK_SIZE};
use super::market_data_model::{
    CatalogItem, NewSnapshotRow, PriceMap, PriceQuote, SnapshotRow, Timeframe, VolumeSnapshot,
};
use super::market_data_traits::MarketDataRepositoryTrait;

pub struct MarketDataRepository {
    pool: Arc<DbPool>,
}

impl MarketDataRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn cutoff_for(window: Duration) -> NaiveDateTime {
    Utc::now().naive_utc() - chrono::Duration::seconds(window.as_secs() as i64)
}

impl MarketDataRepositoryTrait for MarketDataRepository {
    fn save_snapshot_rows(&self, rows: &[NewSnapshotRow]) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;

        let mut saved = 0;
        for (index, batch) in rows.chunks(SNAPSHOT_BATCH_SIZE).enumerate() {
            match diesel::insert_into(item_price_history::table)
                .values(batch)
                .execute(&mut conn)
            {
                Ok(count) => saved += count,
                Err(e) => error!("Error inserting snapshot batch {}: {}", index + 1, e),
            }
        }
        Ok(saved)
    }

    fn get_latest_prices(&self, timeframe: Timeframe, freshness: Duration) -> Result<PriceMap> {
        let mut conn = get_connection(&self.pool)?;
        let cutoff = cutoff_for(freshness);

        let rows: Vec<SnapshotRow> = item_price_history::table
            .filter(item_price_history::timeframe.eq(timeframe.as_str()))
            .filter(item_price_history::timestamp.ge(cutoff))
            .order((
                item_price_history::timestamp.desc(),
                item_price_history::id.desc(),
            ))
            .load(&mut conn)?;

        // Rows arrive newest first; keep the first row seen per item.
        let mut prices = PriceMap::new();
        for row in rows {
            prices.entry(row.item_id).or_insert_with(|| {
                let unix = row.timestamp.and_utc().timestamp();
                PriceQuote {
                    item_id: row.item_id,
                    high_price: row.high_price,
                    low_price: row.low_price,
                    high_time: unix,
                    low_time: unix,
                    volume: Some(row.volume),
                }
            });
        }
        Ok(prices)
    }

    fn get_high_volume_items(&self, limit: i64) -> Result<Vec<SnapshotRow>> {
        let mut conn = get_connection(&self.pool)?;
        let cutoff = cutoff_for(super::market_data_constants::HIGH_VOLUME_LOOKBACK);

        Ok(item_price_history::table
            .filter(item_price_history::timeframe.eq(Timeframe::Latest.as_str()))
            .filter(item_price_history::timestamp.ge(cutoff))
            .order(item_price_history::volume.desc())
            .limit(limit)
            .load(&mut conn)?)
    }

    fn snapshot_stats(&self, lookback: Duration) -> Result<(usize, usize, Option<NaiveDateTime>)> {
        let mut conn = get_connection(&self.pool)?;
        let cutoff = cutoff_for(lookback);

        let rows: Vec<(i32, NaiveDateTime)> = item_price_history::table
            .filter(item_price_history::timeframe.eq(Timeframe::Latest.as_str()))
            .filter(item_price_history::timestamp.ge(cutoff))
            .select((item_price_history::item_id, item_price_history::timestamp))
            .load(&mut conn)?;

        let total_records = rows.len();
        let mut unique = std::collections::HashSet::new();
        let mut last_update = None;
        for (item_id, timestamp) in rows {
            unique.insert(item_id);
            if last_update.map_or(true, |latest| timestamp > latest) {
                last_update = Some(timestamp);
            }
        }
        Ok((unique.len(), total_records, last_update))
    }

    fn upsert_daily_volumes(&self, snapshot: &HashMap<i32, VolumeSnapshot>) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().naive_utc();
        let entries: Vec<(&i32, &VolumeSnapshot)> = snapshot.iter().collect();

        let mut upserted = 0;
        for chunk in entries.chunks(VOLUME_UPSERT_CHUNK_SIZE) {
            upserted += conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                let mut count = 0;
                for (item_id, volumes) in chunk {
                    count += diesel::insert_into(item_volumes::table)
                        .values((
                            item_volumes::item_id.eq(**item_id),
                            item_volumes::high_price.eq(volumes.high_price),
                            item_volumes::low_price.eq(volumes.low_price),
                            item_volumes::high_price_volume.eq(volumes.high_price_volume),
                            item_volumes::low_price_volume.eq(volumes.low_price_volume),
                            item_volumes::last_updated_at.eq(now),
                        ))
                        .on_conflict(item_volumes::item_id)
                        .do_update()
                        .set((
                            item_volumes::high_price.eq(volumes.high_price),
                            item_volumes::low_price.eq(volumes.low_price),
                            item_volumes::high_price_volume.eq(volumes.high_price_volume),
                            item_volumes::low_price_volume.eq(volumes.low_price_volume),
                            item_volumes::last_updated_at.eq(now),
                        ))
                        .execute(conn)?;
                }
                Ok(count)
            })?;
        }
        Ok(upserted)
    }

    fn upsert_hourly_volumes(&self, snapshot: &HashMap<i32, VolumeSnapshot>) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now().naive_utc();
        let entries: Vec<(&i32, &VolumeSnapshot)> = snapshot.iter().collect();

        let mut upserted = 0;
        for chunk in entries.chunks(VOLUME_UPSERT_CHUNK_SIZE) {
            upserted += conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                let mut count = 0;
                for (item_id, volumes) in chunk {
                    count += diesel::insert_into(item_volumes::table)
                        .values((
                            item_volumes::item_id.eq(**item_id),
                            item_volumes::hourly_high_price_volume
                                .eq(volumes.high_price_volume),
                            item_volumes::hourly_low_price_volume.eq(volumes.low_price_volume),
                            item_volumes::last_updated_at.eq(now),
                        ))
                        .on_conflict(item_volumes::item_id)
                        .do_update()
                        .set((
                            item_volumes::hourly_high_price_volume
                                .eq(volumes.high_price_volume),
                            item_volumes::hourly_low_price_volume.eq(volumes.low_price_volume),
                            item_volumes::last_updated_at.eq(now),
                        ))
                        .execute(conn)?;
                }
                Ok(count)
            })?;
        }
        Ok(upserted)
    }

    fn upsert_catalog(&self, items: &[CatalogItem]) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;

        let mut upserted = 0;
        for chunk in items.chunks(VOLUME_UPSERT_CHUNK_SIZE) {
            upserted += conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                let mut count = 0;
                for item in chunk {
                    count += diesel::insert_into(item_mapping::table)
                        .values(item)
                        .on_conflict(item_mapping::id)
                        .do_update()
                        .set(item)
                        .execute(conn)?;
                }
                Ok(count)
            })?;
        }
        Ok(upserted)
    }
}
