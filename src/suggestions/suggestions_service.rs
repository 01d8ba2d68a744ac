use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::market_data::{PriceMap, PriceSyncServiceTrait};

use super::suggestions_model::{
    default_trade_times, detect_manipulation, profit_per_flip, suggestion_score, SuggestedItem,
    SuggestedItemsFilters, SuggestedItemsStats, VolumeCandidate, VolumeType,
    HIGH_VOLUME_BOUNDARY, MIN_MARGIN_PERCENTAGE, SUGGESTION_CACHE_TTL, SUGGESTION_CAP,
};
use super::suggestions_repository::SuggestionRepositoryTrait;

struct CachedList {
    computed_at: Instant,
    items: Vec<SuggestedItem>,
}

/// Ranks trade opportunities from the volume table, topped up with live
/// prices from the synchronization cache for items whose stored prices are
/// missing.
pub struct SuggestionService {
    price_service: Arc<dyn PriceSyncServiceTrait>,
    repository: Arc<dyn SuggestionRepositoryTrait>,
    cache: RwLock<Option<CachedList>>,
}

impl SuggestionService {
    pub fn new(
        price_service: Arc<dyn PriceSyncServiceTrait>,
        repository: Arc<dyn SuggestionRepositoryTrait>,
    ) -> Self {
        Self {
            price_service,
            repository,
            cache: RwLock::new(None),
        }
    }

    /// Ranked, filtered suggestion list, descending by score and capped.
    /// Unfiltered queries are served from a short-lived cache; filtered
    /// queries always recompute.
    pub async fn get_suggested_items(
        &self,
        filters: SuggestedItemsFilters,
    ) -> Result<Vec<SuggestedItem>> {
        if filters.is_unfiltered() {
            if let Some(cached) = self.cache.read().await.as_ref() {
                let age = cached.computed_at.elapsed();
                if age < SUGGESTION_CACHE_TTL {
                    debug!("Serving suggested items from cache ({}s old)", age.as_secs());
                    return Ok(cached.items.clone());
                }
            }
        }

        // Stored prices win; live quotes fill the gaps. A failed live fetch
        // degrades to stored prices only.
        let prices = match self.price_service.get_prices().await {
            Ok(map) => map,
            Err(e) => {
                warn!("Live price top-up unavailable, scoring from stored prices: {}", e);
                PriceMap::new()
            }
        };

        let candidates = self.repository.get_volume_candidates()?;
        debug!("Scoring {} volume candidates", candidates.len());

        let mut items: Vec<SuggestedItem> = candidates
            .iter()
            .filter_map(|candidate| evaluate_candidate(candidate, &prices, &filters))
            .collect();

        items.sort_by(|a, b| b.suggestion_score.cmp(&a.suggestion_score));
        items.truncate(SUGGESTION_CAP);

        if filters.is_unfiltered() {
            *self.cache.write().await = Some(CachedList {
                computed_at: Instant::now(),
                items: items.clone(),
            });
        }

        Ok(items)
    }

    pub async fn get_suggested_items_stats(&self) -> Result<SuggestedItemsStats> {
        let items = self
            .get_suggested_items(SuggestedItemsFilters::default())
            .await?;

        let high_volume_items = items
            .iter()
            .filter(|item| item.volume_24h >= HIGH_VOLUME_BOUNDARY)
            .count();
        let average_margin = if items.is_empty() {
            0.0
        } else {
            let avg = items.iter().map(|i| i.margin_percentage).sum::<f64>() / items.len() as f64;
            (avg * 100.0).round() / 100.0
        };

        Ok(SuggestedItemsStats {
            total_items: items.len(),
            high_volume_items,
            low_volume_items: items.len() - high_volume_items,
            average_margin,
        })
    }
}

fn evaluate_candidate(
    candidate: &VolumeCandidate,
    prices: &PriceMap,
    filters: &SuggestedItemsFilters,
) -> Option<SuggestedItem> {
    let quote = prices.get(&candidate.item_id);
    let sell_price = match candidate.high_price {
        Some(p) if p > 0 => p,
        _ => quote.map(|q| q.high_price).unwrap_or(0),
    };
    let buy_price = match candidate.low_price {
        Some(p) if p > 0 => p,
        _ => quote.map(|q| q.low_price).unwrap_or(0),
    };
    if sell_price == 0 || buy_price == 0 {
        return None;
    }

    let margin = sell_price - buy_price;
    let margin_percentage = margin as f64 / buy_price as f64 * 100.0;
    if margin <= 0 || margin_percentage < MIN_MARGIN_PERCENTAGE {
        return None;
    }

    let volume_24h = candidate
        .high_price_volume
        .max(candidate.low_price_volume);
    let volume_1h = candidate
        .hourly_high_price_volume
        .max(candidate.hourly_low_price_volume);

    let affordable = filters.capital.map_or(true, |capital| buy_price <= capital);
    if filters.capital.is_some() && !affordable {
        return None;
    }

    match filters.volume_type {
        Some(VolumeType::High) if volume_24h < HIGH_VOLUME_BOUNDARY => return None,
        Some(VolumeType::Low) if volume_24h >= HIGH_VOLUME_BOUNDARY => return None,
        _ => {}
    }

    let profit = profit_per_flip(margin);
    let manipulation_warning = detect_manipulation(volume_24h, volume_1h, sell_price, buy_price);
    let (best_buy_time, best_sell_time) = default_trade_times(volume_24h);

    Some(SuggestedItem {
        item_id: candidate.item_id,
        name: candidate.name.clone(),
        icon: candidate.icon.clone(),
        buy_price,
        sell_price,
        margin,
        margin_percentage,
        volume_24h,
        volume_1h,
        profit_per_flip: profit,
        best_buy_time,
        best_sell_time,
        suggestion_score: suggestion_score(volume_24h, profit, manipulation_warning),
        manipulation_warning,
        affordable,
    })
}
