use std::str::FromStr;
use std::time::Duration;

use diesel::prelude::*;
use serde::Serialize;

use crate::errors::ValidationError;

/// Unfiltered suggestion lists are cached this long.
pub const SUGGESTION_CACHE_TTL: Duration = Duration::from_secs(30);

/// Result sets are truncated to this many items to bound payload size.
pub const SUGGESTION_CAP: usize = 500;

/// 24h volume at or above this counts as a high-volume item.
pub const HIGH_VOLUME_BOUNDARY: i64 = 1000;

/// Transaction tax of 2% taken on each flip.
const TAX_RETENTION: f64 = 0.98;

/// Items whose margin percentage falls below this are not worth listing.
pub const MIN_MARGIN_PERCENTAGE: f64 = 0.1;

const VOLUME_SPIKE_FACTOR: f64 = 3.0;
const SPREAD_WARNING_PCT: f64 = 50.0;

const PROFIT_WEIGHT: f64 = 0.7;
const VOLUME_WEIGHT: f64 = 0.3;
const HIGH_PROFIT_PENALTY: f64 = 0.9;
const DEFAULT_PENALTY: f64 = 0.7;

/// One ranked trade opportunity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedItem {
    pub item_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub buy_price: i64,
    pub sell_price: i64,
    pub margin: i64,
    pub margin_percentage: f64,
    #[serde(rename = "volume24h")]
    pub volume_24h: i64,
    #[serde(rename = "volume1h")]
    pub volume_1h: i64,
    pub profit_per_flip: i64,
    pub best_buy_time: &'static str,
    pub best_sell_time: &'static str,
    pub suggestion_score: i64,
    pub manipulation_warning: bool,
    pub affordable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    Global,
    High,
    Low,
}

impl FromStr for VolumeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(VolumeType::Global),
            "high" => Ok(VolumeType::High),
            "low" => Ok(VolumeType::Low),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown volume type '{}', expected one of: global, high, low",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestedItemsFilters {
    pub capital: Option<i64>,
    pub volume_type: Option<VolumeType>,
}

impl SuggestedItemsFilters {
    /// Only fully unfiltered queries hit the shared result cache.
    pub fn is_unfiltered(&self) -> bool {
        self.capital.is_none() && self.volume_type.is_none()
    }
}

/// Aggregate figures over the current suggestion list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedItemsStats {
    pub total_items: usize,
    pub high_volume_items: usize,
    pub low_volume_items: usize,
    pub average_margin: f64,
}

/// Join of per-item volume figures with catalog metadata, restricted to
/// items that traded on both sides of the book.
#[derive(Debug, Clone, Queryable)]
pub struct VolumeCandidate {
    pub item_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub high_price: Option<i64>,
    pub low_price: Option<i64>,
    pub high_price_volume: i64,
    pub low_price_volume: i64,
    pub hourly_high_price_volume: i64,
    pub hourly_low_price_volume: i64,
}

/// Piecewise-linear profit score saturating at 100 for 500k+ profits.
pub fn profit_score(profit_per_flip: i64) -> f64 {
    let p = profit_per_flip as f64;
    if p >= 500_000.0 {
        100.0
    } else if p >= 100_000.0 {
        80.0 + (p - 100_000.0) / 20_000.0
    } else if p >= 50_000.0 {
        60.0 + (p - 50_000.0) / 2_500.0
    } else if p >= 10_000.0 {
        30.0 + (p - 10_000.0) / 1_333.0
    } else {
        (p / 333.0).min(30.0)
    }
}

/// Volume score with diminishing returns, capped at 100.
pub fn volume_score(volume_24h: i64) -> f64 {
    ((volume_24h.max(0) as f64).sqrt() / 100.0).min(100.0)
}

/// Combined 0-100 score: 70% profit, 30% volume, with a penalty factor for
/// flagged items that is softer on high-profit flips.
pub fn suggestion_score(volume_24h: i64, profit_per_flip: i64, manipulation_warning: bool) -> i64 {
    let mut score =
        profit_score(profit_per_flip) * PROFIT_WEIGHT + volume_score(volume_24h) * VOLUME_WEIGHT;
    if manipulation_warning {
        score *= if profit_per_flip >= 500_000 {
            HIGH_PROFIT_PENALTY
        } else {
            DEFAULT_PENALTY
        };
    }
    score.round() as i64
}

/// Heuristic manipulation flag: hourly volume above 3x the expected hourly
/// share of the 24h volume, or a price spread above 50%.
pub fn detect_manipulation(volume_24h: i64, volume_1h: i64, high_price: i64, low_price: i64) -> bool {
    let expected_hourly = volume_24h as f64 / 24.0;
    let volume_spike = volume_1h as f64 > expected_hourly * VOLUME_SPIKE_FACTOR;

    let price_spread = if low_price > 0 {
        (high_price - low_price) as f64 / low_price as f64 * 100.0
    } else {
        0.0
    };

    volume_spike || price_spread > SPREAD_WARNING_PCT
}

/// Post-tax profit for one flip.
pub fn profit_per_flip(margin: i64) -> i64 {
    (margin as f64 * TAX_RETENTION).floor() as i64
}

/// General `(buy, sell)` timing guidance by volume band. High-volume items
/// follow broad daily activity patterns; thin markets get looser advice.
pub fn default_trade_times(volume_24h: i64) -> (&'static str, &'static str) {
    if volume_24h > HIGH_VOLUME_BOUNDARY {
        ("Late Night/Early Morning", "Evening Peak Hours")
    } else {
        ("Off-Peak Hours", "Peak Activity Times")
    }
}
