pub(crate) mod market_data_constants;
pub(crate) mod market_data_errors;
pub(crate) mod market_data_model;
pub(crate) mod market_data_repository;
pub(crate) mod market_data_service;
pub(crate) mod market_data_traits;
pub(crate) mod providers;

// Re-export the public interface
pub use market_data_constants::*;
pub use market_data_model::{
    CacheStats, CatalogItem, FetchEvent, FetchPhase, ItemVolumeRow, NewSnapshotRow, PriceMap,
    PriceQuote, SnapshotRow, Timeframe, VolumeSnapshot,
};
pub use market_data_repository::MarketDataRepository;
pub use market_data_service::PriceSyncService;
pub use market_data_traits::{MarketDataRepositoryTrait, PriceSyncServiceTrait};

// Re-export provider types
pub use providers::market_data_provider::PriceProvider;
pub use providers::wiki_provider::WikiPriceProvider;

// Re-export error types for convenience
pub use market_data_errors::MarketDataError;
