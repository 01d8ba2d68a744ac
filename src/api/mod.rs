pub(crate) mod api_model;
pub(crate) mod api_service;

// Re-export the public interface
pub use api_model::SuggestedItemsQuery;
pub use api_service::ApiService;
