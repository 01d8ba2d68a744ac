pub(crate) mod market_data_provider;
pub(crate) mod models;
pub(crate) mod wiki_provider;

pub use market_data_provider::PriceProvider;
pub use wiki_provider::WikiPriceProvider;
