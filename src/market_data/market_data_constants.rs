use std::time::Duration;

/// How long a committed snapshot is served before a read triggers a refresh.
pub const FETCH_INTERVAL: Duration = Duration::from_secs(120);

/// Read-path window for "most recent row per item". Covers the refresh
/// interval plus fetch latency so that reads between two refreshes still see
/// the last committed snapshot.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(150);

/// Bounded retry budget for a single refresh cycle hitting upstream rate
/// limits. Exhaustion is surfaced to the scheduler; the next tick retries.
pub const MAX_RETRIES: u32 = 3;

/// Snapshot rows are persisted in batches to bound transaction size.
pub const SNAPSHOT_BATCH_SIZE: usize = 100;

/// Volume upserts are chunked the same way.
pub const VOLUME_UPSERT_CHUNK_SIZE: usize = 500;

/// Lookback for the high-volume item query.
pub const HIGH_VOLUME_LOOKBACK: Duration = Duration::from_secs(600);

/// Lookback for snapshot statistics.
pub const STATS_LOOKBACK: Duration = Duration::from_secs(3600);

/// Default upstream price source.
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://prices.runescape.wiki/api/v1/osrs";
