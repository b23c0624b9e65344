//! Subscriptions service client configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Ceiling on the doubled retry delay.
const MAX_BACKOFF_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionsConfig {
    /// Base URL of the subscriptions service
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per activation, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds, doubled per retry
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

impl SubscriptionsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(MAX_BACKOFF_SECS)
    }

    /// Longest one activation call can take: every attempt runs to its
    /// timeout, with the capped backoff slept between attempts.
    pub fn worst_case_activation(&self) -> Duration {
        let cap = self.max_backoff();
        let retries = self.max_attempts.saturating_sub(1);
        let mut total = self.request_timeout().saturating_mul(self.max_attempts);
        let mut delay = self.initial_backoff();
        for retry in 0..retries {
            if delay >= cap {
                return total.saturating_add(cap.saturating_mul(retries - retry));
            }
            total = total.saturating_add(delay);
            delay = delay.saturating_mul(2);
        }
        total
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("SUBSCRIPTIONS__BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidSubscriptionsUrl);
        }
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::SubscriptionsUrlMustBeHttps);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidRetryPolicy);
        }
        Ok(())
    }
}

fn default_request_timeout() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> SubscriptionsConfig {
        SubscriptionsConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }

    #[test]
    fn http_is_allowed_in_development() {
        assert!(config("http://subscriptions:8080")
            .validate(&Environment::Development)
            .is_ok());
    }

    #[test]
    fn production_requires_https() {
        assert_eq!(
            config("http://subscriptions:8080").validate(&Environment::Production),
            Err(ValidationError::SubscriptionsUrlMustBeHttps)
        );
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut c = config("https://subscriptions.internal");
        c.max_attempts = 0;
        assert_eq!(
            c.validate(&Environment::Production),
            Err(ValidationError::InvalidRetryPolicy)
        );
    }

    #[test]
    fn worst_case_sums_timeouts_and_backoff() {
        let c = config("https://subscriptions.internal");
        // 3 x 5s timeouts plus 1s and 2s between attempts.
        assert_eq!(c.worst_case_activation(), Duration::from_secs(18));

        let mut single = c.clone();
        single.max_attempts = 1;
        assert_eq!(single.worst_case_activation(), Duration::from_secs(5));
    }

    #[test]
    fn worst_case_caps_each_backoff() {
        let mut c = config("https://subscriptions.internal");
        c.max_attempts = 8;
        // 8 x 5s, then 1 + 2 + 4 + 8 and three delays capped at 10s.
        assert_eq!(c.worst_case_activation(), Duration::from_secs(40 + 15 + 30));

        c.max_attempts = u32::MAX;
        c.request_timeout_secs = u64::MAX;
        assert_eq!(c.worst_case_activation(), Duration::MAX);
    }

    #[test]
    fn durations_convert_units() {
        let c = config("https://subscriptions.internal");
        assert_eq!(c.request_timeout(), Duration::from_secs(5));
        assert_eq!(c.initial_backoff(), Duration::from_millis(1000));
    }
}
