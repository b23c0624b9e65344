//! Subscription activation port.
//!
//! The subscriptions service owns entitlement windows. This port is the only
//! way the payments core extends one. It carries no payment identifier, so
//! at-most-once invocation per confirmed payment is the caller's job.

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::payment::Plan;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by activation clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// The subscriptions service refused the request. Retrying will not help.
    #[error("activation rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The subscriptions service could not be reached or failed transiently.
    #[error("subscriptions service unavailable: {0}")]
    Unavailable(String),
}

impl ActivationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActivationError::Unavailable(_))
    }
}

/// Extends a user's entitlement.
///
/// The new duration is added to the later of the current expiry and now.
/// A user without an active entitlement gets a fresh window starting now.
#[async_trait]
pub trait SubscriptionActivationClient: Send + Sync {
    /// Returns the new expiry. `correlation_id` ties the call to the
    /// request that triggered it in both services' logs.
    async fn activate(
        &self,
        user_id: &UserId,
        plan: Plan,
        duration_days: u32,
        correlation_id: &str,
    ) -> Result<Timestamp, ActivationError>;
}
