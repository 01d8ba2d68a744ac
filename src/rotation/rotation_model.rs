use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;

/// One outbound request identity: the header set presented to the upstream
/// price source. Profiles live for the process lifetime.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub user_agent: String,
    pub contact: String,
    pub api_key: Option<String>,
}

impl IdentityProfile {
    pub fn new(user_agent: &str, contact: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            contact: contact.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Build the HTTP headers for this identity.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.contact) {
            headers.insert(HeaderName::from_static("contact"), value);
        }
        if let Some(api_key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }
}

/// Outcome of reporting an upstream rate-limit response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSignal {
    pub should_retry: bool,
    pub delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationStats {
    pub total_identities: usize,
    pub current_identity: usize,
    pub identities_in_cooldown: usize,
    pub consecutive_rate_limits: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_carry_identity_fields() {
        let profile = IdentityProfile::new("Flipwatch/1.0 (https://flipwatch.app)", "admin@flipwatch.app")
            .with_api_key(Some("secret".to_string()));
        let headers = profile.headers();
        assert_eq!(
            headers.get(USER_AGENT).unwrap().to_str().unwrap(),
            "Flipwatch/1.0 (https://flipwatch.app)"
        );
        assert_eq!(
            headers.get("contact").unwrap().to_str().unwrap(),
            "admin@flipwatch.app"
        );
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn test_headers_without_api_key() {
        let profile = IdentityProfile::new("Flipwatch/1.0", "ops@flipwatch.app");
        let headers = profile.headers();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.contains_key(ACCEPT));
    }
}
