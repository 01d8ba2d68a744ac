use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// General inbound procedures: looser limit, short window.
const GENERAL_LIMIT: i64 = 1000;
const GENERAL_WINDOW: Duration = Duration::from_secs(3 * 60);

/// Procedures that proxy to the upstream price source: stricter limit,
/// longer window, to avoid overloading the source.
const UPSTREAM_PROXY_LIMIT: i64 = 500;
const UPSTREAM_PROXY_WINDOW: Duration = Duration::from_secs(5 * 60);

const KEY_PREFIX: &str = "rate_limit";

/// Which quota a procedure draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    General,
    UpstreamProxy,
}

impl EndpointClass {
    pub fn policy(&self) -> RatePolicy {
        match self {
            EndpointClass::General => RatePolicy {
                limit: GENERAL_LIMIT,
                window: GENERAL_WINDOW,
            },
            EndpointClass::UpstreamProxy => RatePolicy {
                limit: UPSTREAM_PROXY_LIMIT,
                window: UPSTREAM_PROXY_WINDOW,
            },
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            EndpointClass::General => KEY_PREFIX,
            EndpointClass::UpstreamProxy => "rate_limit:upstream",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub limit: i64,
    pub window: Duration,
}

/// Who is calling: IP plus the authenticated user and session when known.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub ip: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl CallerIdentity {
    pub fn new(ip: &str, user_id: Option<String>, session_id: Option<String>) -> Self {
        Self {
            ip: ip.to_string(),
            user_id,
            session_id,
        }
    }

    pub fn anonymous(ip: &str) -> Self {
        Self::new(ip, None, None)
    }

    /// Composite counter key: `prefix:ip:userId:sessionId`.
    pub fn rate_limit_key(&self, class: EndpointClass) -> String {
        format!(
            "{}:{}:{}:{}",
            class.key_prefix(),
            self.ip,
            self.user_id.as_deref().unwrap_or("anonymous"),
            self.session_id.as_deref().unwrap_or("no-session"),
        )
    }
}

/// One fixed-window counter reading.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    pub count: i64,
    pub reset_at: DateTime<Utc>,
}

/// Outcome of an admission check, also carried on rejection responses as
/// `limit`/`remaining`/`reset` metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: i64,
}

/// Structured "too many requests" payload surfaced to rejected callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRejection {
    pub retry_after_secs: i64,
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl fmt::Display for RateLimitRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Too many requests. Please wait {}s before making more requests.",
            self.retry_after_secs
        )
    }
}

impl From<&AdmissionDecision> for RateLimitRejection {
    fn from(decision: &AdmissionDecision) -> Self {
        Self {
            retry_after_secs: decision.retry_after_secs,
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key_includes_all_caller_parts() {
        let caller = CallerIdentity::new(
            "203.0.113.7",
            Some("user-42".to_string()),
            Some("sess-9".to_string()),
        );
        assert_eq!(
            caller.rate_limit_key(EndpointClass::General),
            "rate_limit:203.0.113.7:user-42:sess-9"
        );
        assert_eq!(
            caller.rate_limit_key(EndpointClass::UpstreamProxy),
            "rate_limit:upstream:203.0.113.7:user-42:sess-9"
        );
    }

    #[test]
    fn test_anonymous_caller_key_defaults() {
        let caller = CallerIdentity::anonymous("203.0.113.7");
        assert_eq!(
            caller.rate_limit_key(EndpointClass::General),
            "rate_limit:203.0.113.7:anonymous:no-session"
        );
    }

    #[test]
    fn test_endpoint_classes_have_independent_policies() {
        let general = EndpointClass::General.policy();
        let upstream = EndpointClass::UpstreamProxy.policy();
        assert!(general.limit > upstream.limit);
        assert!(general.window < upstream.window);
    }
}
