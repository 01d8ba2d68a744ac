use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::rotation::IdentityRotationService;

use super::super::market_data_constants::DEFAULT_SOURCE_BASE_URL;
use super::super::market_data_errors::MarketDataError;
use super::super::market_data_model::{CatalogItem, PriceMap, PriceQuote, Timeframe, VolumeSnapshot};
use super::market_data_provider::PriceProvider;
use super::models::{LatestPricesEnvelope, VolumeSnapshotEnvelope, WireCatalogItem};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP adapter for the public wiki price API. Every call carries the header
/// set of the currently active outbound identity.
pub struct WikiPriceProvider {
    client: reqwest::Client,
    base_url: String,
    rotation: Arc<IdentityRotationService>,
}

impl WikiPriceProvider {
    pub fn new(rotation: Arc<IdentityRotationService>) -> Result<Self, MarketDataError> {
        Self::with_base_url(rotation, DEFAULT_SOURCE_BASE_URL)
    }

    pub fn with_base_url(
        rotation: Arc<IdentityRotationService>,
        base_url: &str,
    ) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rotation,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MarketDataError> {
        let url = format!("{}/{}", self.base_url, path);
        let headers = self.rotation.current_headers();
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_rate_limit_status(status) || has_rate_limit_vocabulary(&body) {
                return Err(MarketDataError::RateLimitExceeded);
            }
            return Err(MarketDataError::ProviderError(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                path,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MarketDataError::ParsingError(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl PriceProvider for WikiPriceProvider {
    async fn fetch_latest_prices(&self) -> Result<PriceMap, MarketDataError> {
        let envelope: LatestPricesEnvelope = self.get_json(Timeframe::Latest.as_str()).await?;

        let mut prices = PriceMap::with_capacity(envelope.data.len());
        for (raw_id, wire) in envelope.data {
            let item_id: i32 = match raw_id.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            prices.insert(
                item_id,
                PriceQuote {
                    item_id,
                    high_price: wire.high.unwrap_or(0),
                    low_price: wire.low.unwrap_or(0),
                    high_time: wire.high_time.unwrap_or(0),
                    low_time: wire.low_time.unwrap_or(0),
                    volume: None,
                },
            );
        }
        Ok(prices)
    }

    async fn fetch_volume_snapshot(
        &self,
        timeframe: Timeframe,
    ) -> Result<HashMap<i32, VolumeSnapshot>, MarketDataError> {
        let envelope: VolumeSnapshotEnvelope = self.get_json(timeframe.as_str()).await?;

        let mut snapshot = HashMap::with_capacity(envelope.data.len());
        for (raw_id, point) in envelope.data {
            let item_id: i32 = match raw_id.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            snapshot.insert(
                item_id,
                VolumeSnapshot {
                    high_price: point.avg_high_price,
                    low_price: point.avg_low_price,
                    high_price_volume: point.high_price_volume,
                    low_price_volume: point.low_price_volume,
                },
            );
        }
        Ok(snapshot)
    }

    async fn fetch_item_catalog(&self) -> Result<Vec<CatalogItem>, MarketDataError> {
        let entries: Vec<WireCatalogItem> = self.get_json("mapping").await?;
        Ok(entries
            .into_iter()
            .map(|entry| CatalogItem {
                id: entry.id,
                name: entry.name,
                icon: entry.icon,
                buy_limit: entry.limit,
                members: entry.members,
            })
            .collect())
    }
}

fn is_rate_limit_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503)
}

fn has_rate_limit_vocabulary(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("rate limit")
        || message.contains("too many requests")
        || message.contains("quota exceeded")
}

fn classify_request_error(error: reqwest::Error) -> MarketDataError {
    if has_rate_limit_vocabulary(&error.to_string()) {
        MarketDataError::RateLimitExceeded
    } else {
        MarketDataError::NetworkError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_status_classification() {
        assert!(is_rate_limit_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_rate_limit_status(StatusCode::BAD_GATEWAY));
        assert!(is_rate_limit_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_rate_limit_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_rate_limit_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_rate_limit_vocabulary_classification() {
        assert!(has_rate_limit_vocabulary("Rate limit exceeded, slow down"));
        assert!(has_rate_limit_vocabulary("429 Too Many Requests"));
        assert!(has_rate_limit_vocabulary("API quota exceeded for key"));
        assert!(!has_rate_limit_vocabulary("connection reset by peer"));
    }

    #[test]
    fn test_latest_envelope_parsing() {
        let raw = r#"{"data":{"561":{"high":102,"highTime":1700000000,"low":98,"lowTime":1700000050},"4151":{"high":3200000,"highTime":1700000010,"low":null,"lowTime":null}}}"#;
        let envelope: LatestPricesEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.len(), 2);
        let nature_rune = &envelope.data["561"];
        assert_eq!(nature_rune.high, Some(102));
        assert_eq!(nature_rune.low_time, Some(1700000050));
        assert_eq!(envelope.data["4151"].low, None);
    }

    #[test]
    fn test_volume_envelope_parsing() {
        let raw = r#"{"data":{"561":{"avgHighPrice":101,"highPriceVolume":52000,"avgLowPrice":97,"lowPriceVolume":48000}},"timestamp":1700000000}"#;
        let envelope: VolumeSnapshotEnvelope = serde_json::from_str(raw).unwrap();
        let point = &envelope.data["561"];
        assert_eq!(point.high_price_volume, 52000);
        assert_eq!(point.avg_low_price, Some(97));
        assert_eq!(envelope.timestamp, Some(1700000000));
    }

    #[test]
    fn test_catalog_entry_parsing() {
        let raw = r#"[{"id":561,"name":"Nature rune","icon":"Nature rune.png","limit":12000,"members":false}]"#;
        let entries: Vec<WireCatalogItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries[0].id, 561);
        assert_eq!(entries[0].limit, Some(12000));
    }
}
