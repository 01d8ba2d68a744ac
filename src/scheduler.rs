use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::context::ServiceContext;
use crate::market_data::{PriceSyncServiceTrait, FETCH_INTERVAL};

const HOURLY_VOLUME_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DAILY_VOLUME_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);
const CATALOG_SYNC_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const COUNTER_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the periodic background loops: price refresh, volume syncs, catalog
/// sync, and admission counter garbage collection. Each loop owns its own
/// timer; a failed cycle is logged and the loop keeps running.
pub fn spawn_background_tasks(context: Arc<ServiceContext>) {
    info!(
        "Starting background tasks (refresh every {}s)",
        FETCH_INTERVAL.as_secs()
    );

    let price_service = context.price_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FETCH_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = price_service.refresh().await {
                error!("Scheduled price refresh failed: {}", e);
            }
        }
    });

    let price_service = context.price_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOURLY_VOLUME_SYNC_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = price_service.sync_hourly_volumes().await {
                error!("Hourly volume sync failed: {}", e);
            }
        }
    });

    let price_service = context.price_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DAILY_VOLUME_SYNC_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = price_service.sync_daily_volumes().await {
                error!("Daily volume sync failed: {}", e);
            }
        }
    });

    let price_service = context.price_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CATALOG_SYNC_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = price_service.sync_item_catalog().await {
                error!("Item catalog sync failed: {}", e);
            }
        }
    });

    let admission = context.admission.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(COUNTER_GC_INTERVAL);
        loop {
            interval.tick().await;
            match admission.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired rate limit counters", purged),
                Err(e) => error!("Rate limit counter purge failed: {}", e),
            }
        }
    });
}
