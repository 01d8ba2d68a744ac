use std::sync::Arc;

use crate::admission::{AdmissionService, CallerIdentity, EndpointClass, RateLimitRejection};
use crate::errors::{Error, Result};
use crate::market_data::{CacheStats, PriceMap, PriceSyncServiceTrait, SnapshotRow};
use crate::suggestions::{SuggestedItem, SuggestedItemsStats, SuggestionService};

use super::api_model::SuggestedItemsQuery;

/// Read procedures exposed to the rest of the application. Every procedure
/// passes admission control first; procedures that can trigger an upstream
/// fetch draw from the stricter proxy quota.
pub struct ApiService {
    admission: Arc<AdmissionService>,
    price_service: Arc<dyn PriceSyncServiceTrait>,
    suggestions: Arc<SuggestionService>,
}

impl ApiService {
    pub fn new(
        admission: Arc<AdmissionService>,
        price_service: Arc<dyn PriceSyncServiceTrait>,
        suggestions: Arc<SuggestionService>,
    ) -> Self {
        Self {
            admission,
            price_service,
            suggestions,
        }
    }

    async fn admit(&self, caller: &CallerIdentity, class: EndpointClass) -> Result<()> {
        let decision = self.admission.check_and_increment(caller, class).await;
        if decision.allowed {
            Ok(())
        } else {
            Err(Error::RateLimited(RateLimitRejection::from(&decision)))
        }
    }

    pub async fn get_prices(&self, caller: &CallerIdentity) -> Result<PriceMap> {
        self.admit(caller, EndpointClass::UpstreamProxy).await?;
        self.price_service.get_prices().await
    }

    pub async fn get_item_prices(
        &self,
        caller: &CallerIdentity,
        item_ids: &[i32],
    ) -> Result<PriceMap> {
        self.admit(caller, EndpointClass::UpstreamProxy).await?;
        self.price_service.get_item_prices(item_ids).await
    }

    pub async fn get_suggested_items(
        &self,
        caller: &CallerIdentity,
        query: SuggestedItemsQuery,
    ) -> Result<Vec<SuggestedItem>> {
        self.admit(caller, EndpointClass::General).await?;
        let filters = query.validate()?;
        self.suggestions.get_suggested_items(filters).await
    }

    pub async fn get_suggested_items_stats(
        &self,
        caller: &CallerIdentity,
    ) -> Result<SuggestedItemsStats> {
        self.admit(caller, EndpointClass::General).await?;
        self.suggestions.get_suggested_items_stats().await
    }

    pub async fn high_volume_items(
        &self,
        caller: &CallerIdentity,
        limit: i64,
    ) -> Result<Vec<SnapshotRow>> {
        self.admit(caller, EndpointClass::General).await?;
        self.price_service.high_volume_items(limit)
    }

    pub async fn cache_stats(&self, caller: &CallerIdentity) -> Result<CacheStats> {
        self.admit(caller, EndpointClass::General).await?;
        self.price_service.cache_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::LocalCounterStore;
    use crate::suggestions::{SuggestionRepositoryTrait, VolumeCandidate};
    use async_trait::async_trait;

    struct StubPriceService;

    #[async_trait]
    impl PriceSyncServiceTrait for StubPriceService {
        async fn get_prices(&self) -> Result<PriceMap> {
            Ok(PriceMap::new())
        }

        async fn get_item_prices(&self, _item_ids: &[i32]) -> Result<PriceMap> {
            Ok(PriceMap::new())
        }

        async fn refresh(&self) -> Result<()> {
            Ok(())
        }

        fn high_volume_items(&self, _limit: i64) -> Result<Vec<SnapshotRow>> {
            Ok(Vec::new())
        }

        fn cache_stats(&self) -> Result<CacheStats> {
            Ok(CacheStats {
                unique_items: 0,
                total_records: 0,
                last_update: None,
                cache_age_secs: None,
                next_fetch_in_secs: None,
            })
        }
    }

    struct StubRepository;

    impl SuggestionRepositoryTrait for StubRepository {
        fn get_volume_candidates(&self) -> Result<Vec<VolumeCandidate>> {
            Ok(Vec::new())
        }
    }

    fn api() -> ApiService {
        let admission = Arc::new(AdmissionService::new(Arc::new(LocalCounterStore::new())));
        let price_service: Arc<dyn PriceSyncServiceTrait> = Arc::new(StubPriceService);
        let suggestions = Arc::new(SuggestionService::new(
            price_service.clone(),
            Arc::new(StubRepository),
        ));
        ApiService::new(admission, price_service, suggestions)
    }

    #[tokio::test]
    async fn test_upstream_proxy_quota_rejects_past_limit() {
        let api = api();
        let caller = CallerIdentity::anonymous("203.0.113.7");
        let limit = EndpointClass::UpstreamProxy.policy().limit;

        for _ in 0..limit {
            assert!(api.get_prices(&caller).await.is_ok());
        }

        match api.get_prices(&caller).await {
            Err(Error::RateLimited(rejection)) => {
                assert!(rejection.retry_after_secs >= 1);
                assert_eq!(rejection.remaining, 0);
            }
            other => panic!("expected rate limit rejection, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_quotas_are_tracked_per_endpoint_class() {
        let api = api();
        let caller = CallerIdentity::anonymous("203.0.113.7");
        let limit = EndpointClass::UpstreamProxy.policy().limit;

        for _ in 0..limit {
            api.get_prices(&caller).await.unwrap();
        }
        assert!(api.get_prices(&caller).await.is_err());

        // General-class procedures still have quota left.
        assert!(api
            .get_suggested_items(&caller, SuggestedItemsQuery::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_query_is_rejected_before_scoring() {
        let api = api();
        let caller = CallerIdentity::anonymous("203.0.113.7");

        let result = api
            .get_suggested_items(
                &caller,
                SuggestedItemsQuery {
                    capital: Some(-1),
                    volume_type: None,
                },
            )
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
