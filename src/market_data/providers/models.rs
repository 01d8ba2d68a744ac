use std::collections::HashMap;

use serde::Deserialize;

/// Envelope of the `latest` endpoint: `{"data": {"<itemId>": {...}}}`.
#[derive(Debug, Deserialize)]
pub struct LatestPricesEnvelope {
    pub data: HashMap<String, WireLatestPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLatestPrice {
    pub high: Option<i64>,
    pub low: Option<i64>,
    pub high_time: Option<i64>,
    pub low_time: Option<i64>,
}

/// Envelope of the `5m`/`1h`/`24h` endpoints.
#[derive(Debug, Deserialize)]
pub struct VolumeSnapshotEnvelope {
    pub data: HashMap<String, WireVolumePoint>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVolumePoint {
    pub avg_high_price: Option<i64>,
    pub avg_low_price: Option<i64>,
    #[serde(default)]
    pub high_price_volume: i64,
    #[serde(default)]
    pub low_price_volume: i64,
}

/// One entry of the `mapping` endpoint (a bare JSON array).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCatalogItem {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub limit: Option<i32>,
    #[serde(default)]
    pub members: bool,
}
