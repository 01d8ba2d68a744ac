use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::errors::{Error, Result};
use crate::rotation::IdentityRotationService;

use super::market_data_constants::{FETCH_INTERVAL, FRESHNESS_WINDOW, MAX_RETRIES, STATS_LOOKBACK};
use super::market_data_errors::MarketDataError;
use super::market_data_model::{
    CacheStats, FetchEvent, FetchPhase, NewSnapshotRow, PriceMap, SnapshotRow, Timeframe,
};
use super::market_data_traits::{MarketDataRepositoryTrait, PriceSyncServiceTrait};
use super::providers::market_data_provider::PriceProvider;

/// Process-local refresh bookkeeping. Only the admission counters are shared
/// across instances; each process polls the upstream source independently.
struct CacheState {
    phase: FetchPhase,
    last_fetch: Option<Instant>,
    retry_count: u32,
}

/// The synchronization cache: owns the refresh schedule, in-flight fetch
/// deduplication, and the read path over persisted snapshots.
pub struct PriceSyncService {
    provider: Arc<dyn PriceProvider>,
    repository: Arc<dyn MarketDataRepositoryTrait>,
    rotation: Arc<IdentityRotationService>,
    state: Mutex<CacheState>,
}

impl PriceSyncService {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        repository: Arc<dyn MarketDataRepositoryTrait>,
        rotation: Arc<IdentityRotationService>,
    ) -> Self {
        Self {
            provider,
            repository,
            rotation,
            state: Mutex::new(CacheState {
                phase: FetchPhase::Idle,
                last_fetch: None,
                retry_count: 0,
            }),
        }
    }

    fn is_stale(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .last_fetch
            .map_or(true, |at| at.elapsed() >= FETCH_INTERVAL)
    }

    fn transition(&self, event: FetchEvent) {
        let mut state = self.state.lock().unwrap();
        state.phase = state.phase.apply(event);
    }

    /// One upstream fetch: latest prices and the short-interval volume
    /// snapshot, merged and persisted as append-only rows.
    async fn fetch_cycle(&self) -> Result<usize> {
        let (latest, five_minute) = tokio::join!(
            self.provider.fetch_latest_prices(),
            self.provider.fetch_volume_snapshot(Timeframe::FiveMinutes)
        );
        let latest = latest.map_err(Error::MarketData)?;
        let five_minute = five_minute.map_err(Error::MarketData)?;

        let timestamp = Utc::now().naive_utc();
        let rows: Vec<NewSnapshotRow> = latest
            .values()
            .map(|quote| NewSnapshotRow {
                item_id: quote.item_id,
                timestamp,
                high_price: quote.high_price,
                low_price: quote.low_price,
                volume: five_minute
                    .get(&quote.item_id)
                    .map(|v| v.total_volume())
                    .unwrap_or(0),
                timeframe: Timeframe::Latest.as_str().to_string(),
            })
            .collect();

        self.repository.save_snapshot_rows(&rows)
    }

    /// Upsert 24h volume figures for all items.
    pub async fn sync_daily_volumes(&self) -> Result<usize> {
        let snapshot = self
            .provider
            .fetch_volume_snapshot(Timeframe::OneDay)
            .await
            .map_err(|e| self.signal_if_rate_limited(e))?;
        let upserted = self.repository.upsert_daily_volumes(&snapshot)?;
        info!("Upserted 24h volume figures for {} items", upserted);
        Ok(upserted)
    }

    /// Upsert 1h volume figures for all items.
    pub async fn sync_hourly_volumes(&self) -> Result<usize> {
        let snapshot = self
            .provider
            .fetch_volume_snapshot(Timeframe::OneHour)
            .await
            .map_err(|e| self.signal_if_rate_limited(e))?;
        let upserted = self.repository.upsert_hourly_volumes(&snapshot)?;
        info!("Upserted 1h volume figures for {} items", upserted);
        Ok(upserted)
    }

    /// Refresh the item catalog from the upstream mapping endpoint.
    pub async fn sync_item_catalog(&self) -> Result<usize> {
        let catalog = self
            .provider
            .fetch_item_catalog()
            .await
            .map_err(|e| self.signal_if_rate_limited(e))?;
        let upserted = self.repository.upsert_catalog(&catalog)?;
        info!("Upserted {} catalog entries", upserted);
        Ok(upserted)
    }

    /// Volume/catalog syncs are not retried within a cycle; the identity
    /// still rotates so the next tick starts on a fresh one.
    fn signal_if_rate_limited(&self, error: MarketDataError) -> Error {
        if matches!(error, MarketDataError::RateLimitExceeded) {
            self.rotation.handle_rate_limit_signal();
        }
        Error::MarketData(error)
    }
}

#[async_trait]
impl PriceSyncServiceTrait for PriceSyncService {
    async fn get_prices(&self) -> Result<PriceMap> {
        if self.is_stale() {
            // Reads never fail on refresh problems; they serve whatever
            // snapshot is committed and let the next tick retry.
            if let Err(e) = self.refresh().await {
                error!("Price refresh failed, serving last snapshot: {}", e);
            }
        } else {
            debug!("Serving cached prices");
        }

        self.repository
            .get_latest_prices(Timeframe::Latest, FRESHNESS_WINDOW)
    }

    async fn get_item_prices(&self, item_ids: &[i32]) -> Result<PriceMap> {
        let mut prices = self.get_prices().await?;
        prices.retain(|item_id, _| item_ids.contains(item_id));
        Ok(prices)
    }

    async fn refresh(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase != FetchPhase::Idle {
                debug!("Fetch already in flight, skipping refresh");
                return Ok(());
            }
            state.phase = state.phase.apply(FetchEvent::FetchStarted);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_cycle().await {
                Ok(count) => {
                    let mut state = self.state.lock().unwrap();
                    state.phase = state.phase.apply(FetchEvent::FetchSucceeded);
                    state.last_fetch = Some(Instant::now());
                    state.retry_count = 0;
                    self.rotation.note_success();
                    info!("Cached {} item prices", count);
                    return Ok(());
                }
                Err(Error::MarketData(MarketDataError::RateLimitExceeded)) => {
                    attempt += 1;
                    {
                        let mut state = self.state.lock().unwrap();
                        state.phase = state.phase.apply(FetchEvent::RateLimited);
                        state.retry_count = attempt;
                    }
                    if attempt > MAX_RETRIES {
                        self.transition(FetchEvent::RetriesExhausted);
                        return Err(Error::MarketData(MarketDataError::RetriesExhausted(
                            MAX_RETRIES,
                        )));
                    }

                    let signal = self.rotation.handle_rate_limit_signal();
                    warn!(
                        "Rate limit detected, retry {}/{} after {}ms",
                        attempt,
                        MAX_RETRIES,
                        signal.delay.as_millis()
                    );
                    tokio::time::sleep(signal.delay).await;
                    self.transition(FetchEvent::RetryStarted);
                }
                Err(e) => {
                    // Network/5xx and persistence failures are not retried
                    // within the cycle; the next scheduled tick tries again.
                    self.transition(FetchEvent::FetchFailed);
                    return Err(e);
                }
            }
        }
    }

    fn high_volume_items(&self, limit: i64) -> Result<Vec<SnapshotRow>> {
        self.repository.get_high_volume_items(limit)
    }

    fn cache_stats(&self) -> Result<CacheStats> {
        let (unique_items, total_records, last_update) =
            self.repository.snapshot_stats(STATS_LOOKBACK)?;
        let state = self.state.lock().unwrap();
        let cache_age_secs = state.last_fetch.map(|at| at.elapsed().as_secs());
        let next_fetch_in_secs = cache_age_secs
            .map(|age| FETCH_INTERVAL.as_secs().saturating_sub(age));
        Ok(CacheStats {
            unique_items,
            total_records,
            last_update,
            cache_age_secs,
            next_fetch_in_secs,
        })
    }
}
