use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Timeframe tag attached to persisted snapshot rows, matching the upstream
/// source's endpoint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Latest,
    FiveMinutes,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Latest => "latest",
            Timeframe::FiveMinutes => "5m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "24h",
        }
    }
}

/// Domain model for one item's current price pair. Immutable once created;
/// a missing item means "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub item_id: i32,
    pub high_price: i64,
    pub low_price: i64,
    pub high_time: i64,
    pub low_time: i64,
    pub volume: Option<i64>,
}

pub type PriceMap = HashMap<i32, PriceQuote>;

/// Per-item volume figures from a short-interval snapshot endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeSnapshot {
    pub high_price: Option<i64>,
    pub low_price: Option<i64>,
    pub high_price_volume: i64,
    pub low_price_volume: i64,
}

impl VolumeSnapshot {
    pub fn total_volume(&self) -> i64 {
        self.high_price_volume + self.low_price_volume
    }
}

/// One entry of the upstream item catalog.
#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::item_mapping)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub buy_limit: Option<i32>,
    pub members: bool,
}

/// Database model for persisted snapshot rows (append-only).
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = crate::schema::item_price_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRow {
    pub id: i32,
    pub item_id: i32,
    pub timestamp: NaiveDateTime,
    pub high_price: i64,
    pub low_price: i64,
    pub volume: i64,
    pub timeframe: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::item_price_history)]
pub struct NewSnapshotRow {
    pub item_id: i32,
    pub timestamp: NaiveDateTime,
    pub high_price: i64,
    pub low_price: i64,
    pub volume: i64,
    pub timeframe: String,
}

/// Database model for per-item volume figures.
#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Selectable)]
#[diesel(table_name = crate::schema::item_volumes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ItemVolumeRow {
    pub item_id: i32,
    pub high_price: Option<i64>,
    pub low_price: Option<i64>,
    pub high_price_volume: i64,
    pub low_price_volume: i64,
    pub hourly_high_price_volume: i64,
    pub hourly_low_price_volume: i64,
    pub last_updated_at: NaiveDateTime,
}

/// Snapshot cache statistics for operational visibility.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub unique_items: usize,
    pub total_records: usize,
    pub last_update: Option<NaiveDateTime>,
    pub cache_age_secs: Option<u64>,
    pub next_fetch_in_secs: Option<u64>,
}

/// Refresh cycle phase. At most one fetch is in flight per process; a
/// concurrent refresh request while not `Idle` is dropped, not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    BackoffRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent {
    FetchStarted,
    FetchSucceeded,
    FetchFailed,
    RateLimited,
    RetryStarted,
    RetriesExhausted,
}

impl FetchPhase {
    /// Pure transition function for the refresh state machine. Events that
    /// make no sense in the current phase leave it unchanged.
    pub fn apply(self, event: FetchEvent) -> FetchPhase {
        match (self, event) {
            (FetchPhase::Idle, FetchEvent::FetchStarted) => FetchPhase::Fetching,
            (FetchPhase::Fetching, FetchEvent::FetchSucceeded) => FetchPhase::Idle,
            (FetchPhase::Fetching, FetchEvent::FetchFailed) => FetchPhase::Idle,
            (FetchPhase::Fetching, FetchEvent::RateLimited) => FetchPhase::BackoffRetry,
            (FetchPhase::BackoffRetry, FetchEvent::RetryStarted) => FetchPhase::Fetching,
            (FetchPhase::BackoffRetry, FetchEvent::RetriesExhausted) => FetchPhase::Idle,
            (phase, _) => phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_phase_success_path() {
        let phase = FetchPhase::Idle
            .apply(FetchEvent::FetchStarted)
            .apply(FetchEvent::FetchSucceeded);
        assert_eq!(phase, FetchPhase::Idle);
    }

    #[test]
    fn test_fetch_phase_bounded_retry_path() {
        let mut phase = FetchPhase::Idle.apply(FetchEvent::FetchStarted);
        for _ in 0..3 {
            phase = phase.apply(FetchEvent::RateLimited);
            assert_eq!(phase, FetchPhase::BackoffRetry);
            phase = phase.apply(FetchEvent::RetryStarted);
            assert_eq!(phase, FetchPhase::Fetching);
        }
        phase = phase
            .apply(FetchEvent::RateLimited)
            .apply(FetchEvent::RetriesExhausted);
        assert_eq!(phase, FetchPhase::Idle);
    }

    #[test]
    fn test_fetch_phase_ignores_out_of_order_events() {
        assert_eq!(
            FetchPhase::Idle.apply(FetchEvent::FetchSucceeded),
            FetchPhase::Idle
        );
        assert_eq!(
            FetchPhase::Fetching.apply(FetchEvent::FetchStarted),
            FetchPhase::Fetching
        );
        assert_eq!(
            FetchPhase::BackoffRetry.apply(FetchEvent::RateLimited),
            FetchPhase::BackoffRetry
        );
    }

    #[test]
    fn test_timeframe_tags() {
        assert_eq!(Timeframe::Latest.as_str(), "latest");
        assert_eq!(Timeframe::FiveMinutes.as_str(), "5m");
        assert_eq!(Timeframe::OneHour.as_str(), "1h");
        assert_eq!(Timeframe::OneDay.as_str(), "24h");
    }
}
