pub(crate) mod rotation_model;
pub(crate) mod rotation_service;

pub use rotation_model::{IdentityProfile, RateLimitSignal, RotationStats};
pub use rotation_service::IdentityRotationService;
