use std::collections::HashMap;

use async_trait::async_trait;

use super::super::market_data_errors::MarketDataError;
use super::super::market_data_model::{CatalogItem, PriceMap, Timeframe, VolumeSnapshot};

/// Source adapter for the upstream price API. Implementations classify
/// failures: 429/502/503 responses and rate-limit vocabulary map to
/// `MarketDataError::RateLimitExceeded`, everything else to provider or
/// network errors.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Latest instant-buy/instant-sell prices for every tracked item.
    /// Quotes carry no volume; the sync cycle merges it separately.
    async fn fetch_latest_prices(&self) -> Result<PriceMap, MarketDataError>;

    /// Aggregated volume (and average price) figures for a timeframe
    /// (`5m`, `1h` or `24h`).
    async fn fetch_volume_snapshot(
        &self,
        timeframe: Timeframe,
    ) -> Result<HashMap<i32, VolumeSnapshot>, MarketDataError>;

    /// The item catalog: id, name, icon, buy limit.
    async fn fetch_item_catalog(&self) -> Result<Vec<CatalogItem>, MarketDataError>;
}
