pub(crate) mod admission_errors;
pub(crate) mod admission_model;
pub(crate) mod admission_service;
pub(crate) mod admission_store;
pub(crate) mod admission_traits;

// Re-export the public interface
pub use admission_errors::AdmissionError;
pub use admission_model::{
    AdmissionDecision, CallerIdentity, EndpointClass, RateLimitRejection, RatePolicy, WindowCount,
};
pub use admission_service::AdmissionService;
pub use admission_store::{LocalCounterStore, ResilientCounterStore, SharedCounterStore};
pub use admission_traits::CounterStore;
