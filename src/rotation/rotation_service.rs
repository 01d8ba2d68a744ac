use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{info, warn};
use reqwest::header::HeaderMap;

use super::rotation_model::{IdentityProfile, RateLimitSignal, RotationStats};

/// Rotate to a fresh identity after this much wall time even without any
/// rate-limit signal, to spread load across the pool.
const ROTATION_INTERVAL: Duration = Duration::from_secs(30);

/// How long a rate-limited identity is barred from selection.
const COOLDOWN: Duration = Duration::from_secs(60);

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CEILING: Duration = Duration::from_secs(30);

struct RotationState {
    identities: Vec<IdentityProfile>,
    cooldown_until: Vec<Option<Instant>>,
    current: usize,
    last_rotation: Instant,
    consecutive_rate_limits: u32,
}

impl RotationState {
    fn is_cooling(&self, index: usize, now: Instant) -> bool {
        matches!(self.cooldown_until[index], Some(until) if until > now)
    }
}

/// Owns the pool of outbound request identities and decides which one each
/// upstream call presents. All state is process-local.
pub struct IdentityRotationService {
    state: Mutex<RotationState>,
}

impl IdentityRotationService {
    pub fn new(identities: Vec<IdentityProfile>) -> Self {
        assert!(
            !identities.is_empty(),
            "identity pool must contain at least one profile"
        );
        let count = identities.len();
        Self {
            state: Mutex::new(RotationState {
                identities,
                cooldown_until: vec![None; count],
                current: 0,
                last_rotation: Instant::now(),
                consecutive_rate_limits: 0,
            }),
        }
    }

    /// Default identity pool. API keys come from the environment so that
    /// deployments can attach per-identity upstream credentials.
    pub fn with_default_identities() -> Self {
        let identities = vec![
            IdentityProfile::new(
                "Flipwatch/1.0 (https://flipwatch.app)",
                "admin@flipwatch.app",
            )
            .with_api_key(std::env::var("PRICE_API_KEY_1").ok()),
            IdentityProfile::new(
                "Flipwatch-Analytics/1.0 (contact@flipwatch.app)",
                "analytics@flipwatch.app",
            )
            .with_api_key(std::env::var("PRICE_API_KEY_2").ok()),
            IdentityProfile::new(
                "Flipwatch-Cache/1.0 (cache@flipwatch.app)",
                "cache@flipwatch.app",
            )
            .with_api_key(std::env::var("PRICE_API_KEY_3").ok()),
            IdentityProfile::new(
                "Flipwatch-Monitor/1.0 (monitor@flipwatch.app)",
                "monitor@flipwatch.app",
            )
            .with_api_key(std::env::var("PRICE_API_KEY_4").ok()),
        ];
        Self::new(identities)
    }

    /// Headers for the currently active identity. Rotates first when the
    /// active identity has been in use longer than the rotation interval.
    pub fn current_headers(&self) -> HeaderMap {
        self.current_headers_at(Instant::now())
    }

    /// Advance round-robin to the next identity that is not in cooldown.
    pub fn rotate(&self) {
        self.rotate_at(Instant::now());
    }

    /// React to an upstream rate-limit classification: put the active
    /// identity into cooldown, rotate, and hand back a capped exponential
    /// backoff delay for the caller's retry loop.
    pub fn handle_rate_limit_signal(&self) -> RateLimitSignal {
        self.handle_rate_limit_signal_at(Instant::now())
    }

    /// Reset the backoff ladder after a successful upstream call.
    pub fn note_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_rate_limits = 0;
    }

    pub fn stats(&self) -> RotationStats {
        let state = self.state.lock().unwrap();
        let now = Instant::now();
        let cooling = (0..state.identities.len())
            .filter(|&i| state.is_cooling(i, now))
            .count();
        RotationStats {
            total_identities: state.identities.len(),
            current_identity: state.current + 1,
            identities_in_cooldown: cooling,
            consecutive_rate_limits: state.consecutive_rate_limits,
        }
    }

    fn current_headers_at(&self, now: Instant) -> HeaderMap {
        let mut state = self.state.lock().unwrap();
        if now.duration_since(state.last_rotation) >= ROTATION_INTERVAL {
            Self::advance(&mut state, now);
        }
        state.identities[state.current].headers()
    }

    fn rotate_at(&self, now: Instant) {
        let mut state = self.state.lock().unwrap();
        Self::advance(&mut state, now);
    }

    fn handle_rate_limit_signal_at(&self, now: Instant) -> RateLimitSignal {
        let mut state = self.state.lock().unwrap();
        let current = state.current;
        state.cooldown_until[current] = Some(now + COOLDOWN);
        Self::advance(&mut state, now);
        state.consecutive_rate_limits = state.consecutive_rate_limits.min(31) + 1;

        let exponent = state.consecutive_rate_limits.min(BACKOFF_CEILING.as_secs().ilog2() + 1);
        let delay = BACKOFF_CEILING.min(BACKOFF_BASE * 2u32.pow(exponent));
        warn!(
            "Upstream rate limit: identity {} cooling down, switched to {} (backoff {}ms)",
            current + 1,
            state.current + 1,
            delay.as_millis()
        );
        RateLimitSignal {
            should_retry: true,
            delay,
        }
    }

    fn advance(state: &mut RotationState, now: Instant) {
        let count = state.identities.len();
        for step in 1..=count {
            let candidate = (state.current + step) % count;
            if !state.is_cooling(candidate, now) {
                state.current = candidate;
                state.last_rotation = now;
                info!(
                    "Switched to identity {}/{}",
                    state.current + 1,
                    count
                );
                return;
            }
        }
        // Every identity is cooling down; keep round-robin order anyway
        // rather than hammering a single profile.
        state.current = (state.current + 1) % count;
        state.last_rotation = now;
        warn!("All identities in cooldown, advancing round-robin regardless");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(count: usize) -> Vec<IdentityProfile> {
        (0..count)
            .map(|i| {
                IdentityProfile::new(
                    &format!("Flipwatch-{}/1.0", i),
                    &format!("id{}@flipwatch.app", i),
                )
            })
            .collect()
    }

    fn current_user_agent(service: &IdentityRotationService) -> String {
        let state = service.state.lock().unwrap();
        state.identities[state.current].user_agent.clone()
    }

    #[test]
    fn test_rotation_visits_each_identity_once_before_repeating() {
        let service = IdentityRotationService::new(pool(4));
        let now = Instant::now();

        let mut seen = vec![current_user_agent(&service)];
        for _ in 0..3 {
            service.rotate_at(now);
            seen.push(current_user_agent(&service));
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);

        // The next rotation wraps back to the starting identity.
        let first = current_user_agent(&service);
        for _ in 0..4 {
            service.rotate_at(now);
        }
        assert_eq!(current_user_agent(&service), first);
    }

    #[test]
    fn test_rotation_skips_identities_in_cooldown() {
        let service = IdentityRotationService::new(pool(3));
        let now = Instant::now();

        // Identity 0 is active; a rate-limit signal cools it and rotates.
        service.handle_rate_limit_signal_at(now);
        let cooled = {
            let state = service.state.lock().unwrap();
            assert_eq!(state.current, 1);
            state.identities[0].user_agent.clone()
        };

        // Rotating through the remaining pool never selects the cooled one.
        for _ in 0..4 {
            service.rotate_at(now + Duration::from_secs(1));
            assert_ne!(current_user_agent(&service), cooled);
        }

        // After the cooldown elapses it rejoins the rotation.
        let later = now + Duration::from_secs(61);
        let mut seen = Vec::new();
        for _ in 0..3 {
            service.rotate_at(later);
            seen.push(current_user_agent(&service));
        }
        assert!(seen.contains(&cooled));
    }

    #[test]
    fn test_backoff_grows_exponentially_and_caps() {
        let service = IdentityRotationService::new(pool(4));
        let now = Instant::now();

        let first = service.handle_rate_limit_signal_at(now);
        let second = service.handle_rate_limit_signal_at(now);
        assert!(first.should_retry);
        assert!(second.delay > first.delay);

        let mut last = second;
        for _ in 0..10 {
            last = service.handle_rate_limit_signal_at(now);
        }
        assert_eq!(last.delay, Duration::from_secs(30));
    }

    #[test]
    fn test_success_resets_backoff_ladder() {
        let service = IdentityRotationService::new(pool(4));
        let now = Instant::now();

        for _ in 0..5 {
            service.handle_rate_limit_signal_at(now);
        }
        service.note_success();
        let signal = service.handle_rate_limit_signal_at(now + Duration::from_secs(120));
        assert_eq!(signal.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_time_based_auto_rotation() {
        let service = IdentityRotationService::new(pool(2));
        let now = Instant::now();

        let before = current_user_agent(&service);
        service.current_headers_at(now + Duration::from_secs(10));
        assert_eq!(current_user_agent(&service), before);

        service.current_headers_at(now + Duration::from_secs(31));
        assert_ne!(current_user_agent(&service), before);
    }
}
