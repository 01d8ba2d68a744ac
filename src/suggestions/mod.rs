pub(crate) mod suggestions_model;
pub(crate) mod suggestions_repository;
pub(crate) mod suggestions_service;

// Re-export the public interface
pub use suggestions_model::{
    SuggestedItem, SuggestedItemsFilters, SuggestedItemsStats, VolumeCandidate, VolumeType,
};
pub use suggestions_repository::{SuggestionRepository, SuggestionRepositoryTrait};
pub use suggestions_service::SuggestionService;
