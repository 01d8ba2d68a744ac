use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, warn};

use super::admission_errors::AdmissionError;
use super::admission_model::{AdmissionDecision, CallerIdentity, EndpointClass, RatePolicy};
use super::admission_traits::CounterStore;

/// Fixed-window admission control in front of the read procedures.
///
/// When the counter store is unreachable the service fails open: a broken
/// store must not take the read path down with it.
pub struct AdmissionService {
    store: Arc<dyn CounterStore>,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Count this call against the caller's quota for the given endpoint
    /// class and decide whether to admit it.
    pub async fn check_and_increment(
        &self,
        caller: &CallerIdentity,
        class: EndpointClass,
    ) -> AdmissionDecision {
        let key = caller.rate_limit_key(class);
        let decision = self.check_key(&key, class.policy()).await;
        if !decision.allowed {
            warn!(
                "Rate limit exceeded for {}: limit {} reached, retry after {}s",
                key, decision.limit, decision.retry_after_secs
            );
        }
        decision
    }

    async fn check_key(&self, key: &str, policy: RatePolicy) -> AdmissionDecision {
        let reading = match self.store.increment(key, policy.window).await {
            Ok(reading) => reading,
            Err(e) => {
                // Fail open rather than rejecting every caller.
                error!("Admission counter store unavailable, admitting {}: {}", key, e);
                return AdmissionDecision {
                    allowed: true,
                    limit: policy.limit,
                    remaining: policy.limit,
                    reset_at: Utc::now(),
                    retry_after_secs: 0,
                };
            }
        };

        let allowed = reading.count <= policy.limit;
        let remaining = (policy.limit - reading.count).max(0);
        let retry_after_secs = if allowed {
            0
        } else {
            (reading.reset_at - Utc::now()).num_seconds().max(1)
        };

        debug!(
            "Admission check for {}: count={} limit={} allowed={}",
            key, reading.count, policy.limit, allowed
        );

        AdmissionDecision {
            allowed,
            limit: policy.limit,
            remaining,
            reset_at: reading.reset_at,
            retry_after_secs,
        }
    }

    /// Drop elapsed counter windows. Run periodically from the scheduler.
    pub async fn purge_expired(&self) -> Result<usize, AdmissionError> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::admission_store::{FailingCounterStore, LocalCounterStore};
    use std::time::Duration;

    fn service() -> AdmissionService {
        AdmissionService::new(Arc::new(LocalCounterStore::new()))
    }

    #[tokio::test]
    async fn test_rejects_past_limit_boundary() {
        let service = service();
        let policy = RatePolicy {
            limit: 5,
            window: Duration::from_secs(60),
        };

        for _ in 0..5 {
            let decision = service.check_key("k", policy).await;
            assert!(decision.allowed);
        }

        let sixth = service.check_key("k", policy).await;
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert!(sixth.retry_after_secs >= 1);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let service = service();
        let policy = RatePolicy {
            limit: 3,
            window: Duration::from_secs(60),
        };

        assert_eq!(service.check_key("k", policy).await.remaining, 2);
        assert_eq!(service.check_key("k", policy).await.remaining, 1);
        assert_eq!(service.check_key("k", policy).await.remaining, 0);
    }

    #[tokio::test]
    async fn test_callers_draw_from_separate_quotas() {
        let service = service();
        let alice = CallerIdentity::new("10.0.0.1", Some("alice".to_string()), None);
        let bob = CallerIdentity::anonymous("10.0.0.1");

        let a = service
            .check_and_increment(&alice, EndpointClass::General)
            .await;
        let b = service
            .check_and_increment(&bob, EndpointClass::General)
            .await;

        assert_eq!(a.remaining, b.remaining);
    }

    #[tokio::test]
    async fn test_endpoint_classes_draw_from_separate_quotas() {
        let service = service();
        let caller = CallerIdentity::anonymous("10.0.0.1");

        let general = service
            .check_and_increment(&caller, EndpointClass::General)
            .await;
        let upstream = service
            .check_and_increment(&caller, EndpointClass::UpstreamProxy)
            .await;

        assert_eq!(general.remaining, general.limit - 1);
        assert_eq!(upstream.remaining, upstream.limit - 1);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_is_down() {
        let service = AdmissionService::new(Arc::new(FailingCounterStore));
        let caller = CallerIdentity::anonymous("10.0.0.1");

        let decision = service
            .check_and_increment(&caller, EndpointClass::General)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.retry_after_secs, 0);
    }
}
