use std::time::Duration;

use async_trait::async_trait;

use super::admission_errors::AdmissionError;
use super::admission_model::WindowCount;

/// Atomic fixed-window counter with TTL semantics. Implementations must
/// guarantee that concurrent increments for the same key are never lost.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, starting a fresh window when the
    /// previous one has elapsed. Returns the post-increment reading.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, AdmissionError>;

    /// Drop entries whose window has elapsed. Returns how many were purged.
    async fn purge_expired(&self) -> Result<usize, AdmissionError>;
}
