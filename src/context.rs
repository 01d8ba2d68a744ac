use std::sync::Arc;

use log::info;

use crate::admission::{
    AdmissionService, LocalCounterStore, ResilientCounterStore, SharedCounterStore,
};
use crate::api::ApiService;
use crate::db::{self, DbPool};
use crate::errors::Result;
use crate::market_data::{MarketDataRepository, PriceSyncService, WikiPriceProvider};
use crate::rotation::IdentityRotationService;
use crate::suggestions::{SuggestionRepository, SuggestionService};

/// Service graph composed once at process startup and handed to request
/// handlers by reference. One instance per process.
pub struct ServiceContext {
    pub pool: Arc<DbPool>,
    pub rotation: Arc<IdentityRotationService>,
    pub price_service: Arc<PriceSyncService>,
    pub admission: Arc<AdmissionService>,
    pub suggestions: Arc<SuggestionService>,
    pub api: Arc<ApiService>,
}

impl ServiceContext {
    pub fn new(app_data_dir: &str) -> Result<Self> {
        let db_path = db::init(app_data_dir)?;
        let pool = db::create_pool(&db_path)?;
        db::run_migrations(&pool)?;
        Self::from_pool(pool)
    }

    pub fn from_pool(pool: Arc<DbPool>) -> Result<Self> {
        let rotation = Arc::new(IdentityRotationService::with_default_identities());
        let provider = Arc::new(WikiPriceProvider::new(rotation.clone())?);
        let market_repository = Arc::new(MarketDataRepository::new(pool.clone()));
        let price_service = Arc::new(PriceSyncService::new(
            provider,
            market_repository,
            rotation.clone(),
        ));

        let counter_store = Arc::new(ResilientCounterStore::new(
            Arc::new(SharedCounterStore::new(pool.clone())),
            Arc::new(LocalCounterStore::new()),
        ));
        let admission = Arc::new(AdmissionService::new(counter_store));

        let suggestion_repository = Arc::new(SuggestionRepository::new(pool.clone()));
        let suggestions = Arc::new(SuggestionService::new(
            price_service.clone(),
            suggestion_repository,
        ));

        let api = Arc::new(ApiService::new(
            admission.clone(),
            price_service.clone(),
            suggestions.clone(),
        ));

        info!("Service context initialized");

        Ok(Self {
            pool,
            rotation,
            price_service,
            admission,
            suggestions,
            api,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[test]
    fn test_context_composes_from_pool() {
        let context = ServiceContext::from_pool(create_test_pool()).unwrap();
        assert_eq!(Arc::strong_count(&context.api), 1);
    }
}
