//! HTTP client for the subscriptions service.
//!
//! Calls `POST {base_url}/api/v1/internal/subscriptions/activate` with the
//! internal API key. Transport errors and 5xx responses are retried with
//! exponential backoff; 4xx responses are rejected immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::payment::Plan;
use crate::ports::{ActivationError, SubscriptionActivationClient};

const ACTIVATE_PATH: &str = "/api/v1/internal/subscriptions/activate";
const INTERNAL_KEY_HEADER: &str = "X-INTERNAL-KEY";
const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Configuration for [`HttpSubscriptionActivationClient`].
#[derive(Debug, Clone)]
pub struct SubscriptionsClientConfig {
    pub base_url: String,
    internal_api_key: SecretString,
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl SubscriptionsClientConfig {
    pub fn new(base_url: impl Into<String>, internal_api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            internal_api_key,
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay before retry number `retry` (0-based): doubles each time, capped.
    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivateSubscriptionRequest<'a> {
    user_id: &'a str,
    plan: &'a str,
    duration_days: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    end_at: DateTime<Utc>,
}

/// Activation client backed by the subscriptions service REST API.
pub struct HttpSubscriptionActivationClient {
    config: SubscriptionsClientConfig,
    client: Client,
}

impl HttpSubscriptionActivationClient {
    pub fn new(config: SubscriptionsClientConfig) -> Result<Self, ActivationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ActivationError::Unavailable(format!("HTTP client setup: {}", e)))?;

        Ok(Self { config, client })
    }

    fn activate_url(&self) -> String {
        format!("{}{}", self.config.base_url, ACTIVATE_PATH)
    }

    async fn send_once(
        &self,
        body: &ActivateSubscriptionRequest<'_>,
        correlation_id: &str,
    ) -> Result<Timestamp, ActivationError> {
        let response = self
            .client
            .post(self.activate_url())
            .header(INTERNAL_KEY_HEADER, self.config.internal_api_key.expose_secret())
            .header(CORRELATION_HEADER, correlation_id)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ActivationError::Unavailable(format!(
                        "timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    ActivationError::Unavailable(format!("connection failed: {}", e))
                } else {
                    ActivationError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: SubscriptionResponse = response.json().await.map_err(|e| {
                ActivationError::Unavailable(format!("unreadable activation response: {}", e))
            })?;
            return Ok(Timestamp::from_datetime(parsed.end_at));
        }

        let error_body = response.text().await.unwrap_or_default();
        Err(classify_status(status, error_body))
    }
}

fn classify_status(status: StatusCode, body: String) -> ActivationError {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        ActivationError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    } else {
        ActivationError::Unavailable(format!("status {}: {}", status, body))
    }
}

#[async_trait]
impl SubscriptionActivationClient for HttpSubscriptionActivationClient {
    async fn activate(
        &self,
        user_id: &UserId,
        plan: Plan,
        duration_days: u32,
        correlation_id: &str,
    ) -> Result<Timestamp, ActivationError> {
        let body = ActivateSubscriptionRequest {
            user_id: user_id.as_str(),
            plan: plan.as_str(),
            duration_days,
        };

        let mut attempt = 1;
        loop {
            tracing::debug!(
                user_id = %user_id,
                plan = %plan,
                duration_days,
                attempt,
                correlation_id = %correlation_id,
                "Activating subscription"
            );

            match self.send_once(&body, correlation_id).await {
                Ok(new_expiry) => return Ok(new_expiry),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_for(attempt - 1);
                    tracing::warn!(
                        user_id = %user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Subscription activation failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
