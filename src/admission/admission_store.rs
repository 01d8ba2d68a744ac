use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use diesel::prelude::*;
use log::warn;

use crate::db::DbPool;
use crate::schema::rate_limit_counters;

use super::admission_errors::AdmissionError;
use super::admission_model::WindowCount;
use super::admission_traits::CounterStore;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::rate_limit_counters)]
struct CounterRow {
    key: String,
    count: i64,
    window_reset_at: NaiveDateTime,
}

/// Counter store backed by the shared relational database, so quota
/// enforcement is consistent across all service instances. The increment
/// runs inside an immediate transaction, making it atomic per key.
pub struct SharedCounterStore {
    pool: Arc<DbPool>,
}

impl SharedCounterStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for SharedCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, AdmissionError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().naive_utc();
        let reset = now + chrono::Duration::seconds(window.as_secs() as i64);

        let row = conn.immediate_transaction::<CounterRow, diesel::result::Error, _>(|conn| {
            let existing: Option<CounterRow> = rate_limit_counters::table
                .find(key)
                .first(conn)
                .optional()?;

            match existing {
                Some(current) if current.window_reset_at > now => {
                    let updated = CounterRow {
                        key: key.to_string(),
                        count: current.count + 1,
                        window_reset_at: current.window_reset_at,
                    };
                    diesel::update(rate_limit_counters::table.find(key))
                        .set(rate_limit_counters::count.eq(updated.count))
                        .execute(conn)?;
                    Ok(updated)
                }
                Some(_) => {
                    // Previous window elapsed; start a fresh one.
                    let updated = CounterRow {
                        key: key.to_string(),
                        count: 1,
                        window_reset_at: reset,
                    };
                    diesel::update(rate_limit_counters::table.find(key))
                        .set((
                            rate_limit_counters::count.eq(updated.count),
                            rate_limit_counters::window_reset_at.eq(updated.window_reset_at),
                        ))
                        .execute(conn)?;
                    Ok(updated)
                }
                None => {
                    let created = CounterRow {
                        key: key.to_string(),
                        count: 1,
                        window_reset_at: reset,
                    };
                    diesel::insert_into(rate_limit_counters::table)
                        .values(&created)
                        .execute(conn)?;
                    Ok(created)
                }
            }
        })?;

        Ok(WindowCount {
            count: row.count,
            reset_at: row.window_reset_at.and_utc(),
        })
    }

    async fn purge_expired(&self) -> Result<usize, AdmissionError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().naive_utc();
        Ok(diesel::delete(
            rate_limit_counters::table.filter(rate_limit_counters::window_reset_at.le(now)),
        )
        .execute(&mut conn)?)
    }
}

/// Single-process fallback store. DashMap's entry guard serializes
/// concurrent increments per key, so counts are never lost.
#[derive(Default)]
pub struct LocalCounterStore {
    entries: DashMap<String, WindowCount>,
}

impl LocalCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, AdmissionError> {
        let now = Utc::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(WindowCount {
            count: 0,
            reset_at: now + window,
        });
        if entry.reset_at <= now {
            // Window elapsed; reinitialize in place.
            entry.count = 0;
            entry.reset_at = now + window;
        }
        entry.count += 1;
        Ok(*entry)
    }

    async fn purge_expired(&self) -> Result<usize, AdmissionError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, window| window.reset_at > now);
        Ok(before - self.entries.len())
    }
}

/// Tries the shared store first and falls back to the local one when it is
/// unreachable, keeping the service available at the cost of per-instance
/// counting while the shared store is down.
pub struct ResilientCounterStore {
    shared: Arc<dyn CounterStore>,
    local: Arc<dyn CounterStore>,
}

impl ResilientCounterStore {
    pub fn new(shared: Arc<dyn CounterStore>, local: Arc<dyn CounterStore>) -> Self {
        Self { shared, local }
    }
}

#[async_trait]
impl CounterStore for ResilientCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, AdmissionError> {
        match self.shared.increment(key, window).await {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!("Shared counter store failed, falling back to local: {}", e);
                self.local.increment(key, window).await
            }
        }
    }

    async fn purge_expired(&self) -> Result<usize, AdmissionError> {
        let mut purged = 0;
        match self.shared.purge_expired().await {
            Ok(count) => purged += count,
            Err(e) => warn!("Shared counter store purge failed: {}", e),
        }
        purged += self.local.purge_expired().await?;
        Ok(purged)
    }
}

#[cfg(test)]
pub(crate) struct FailingCounterStore;

#[cfg(test)]
#[async_trait]
impl CounterStore for FailingCounterStore {
    async fn increment(
        &self,
        _key: &str,
        _window: Duration,
    ) -> Result<WindowCount, AdmissionError> {
        Err(AdmissionError::StoreError("store unreachable".to_string()))
    }

    async fn purge_expired(&self) -> Result<usize, AdmissionError> {
        Err(AdmissionError::StoreError("store unreachable".to_string()))
    }
}
