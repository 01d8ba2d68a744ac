pub mod db;

pub mod admission;
pub mod api;
pub mod context;
pub mod errors;
pub mod market_data;
pub mod rotation;
pub mod scheduler;
pub mod schema;
pub mod suggestions;

pub use context::ServiceContext;
pub use errors::{Error, Result};
