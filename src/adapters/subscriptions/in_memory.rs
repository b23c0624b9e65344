//! In-memory subscription activation client.
//!
//! Applies the entitlement extension rule locally and records every call,
//! so tests can assert at-most-once activation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::payment::Plan;
use crate::domain::subscription::Entitlement;
use crate::ports::{ActivationError, SubscriptionActivationClient};

/// One recorded activation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCall {
    pub user_id: UserId,
    pub plan: Plan,
    pub duration_days: u32,
    pub correlation_id: String,
}

/// Activation client that keeps entitlements in memory.
#[derive(Default)]
pub struct InMemorySubscriptionActivationClient {
    entitlements: Mutex<HashMap<UserId, Entitlement>>,
    calls: Mutex<Vec<ActivationCall>>,
    scripted_failures: Mutex<VecDeque<ActivationError>>,
}

impl InMemorySubscriptionActivationClient {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Makes the next activation calls fail with the given errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = ActivationError>) {
        self.scripted_failures
            .lock()
            .expect("InMemorySubscriptionActivationClient: failures lock poisoned")
            .extend(errors);
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .expect("InMemorySubscriptionActivationClient: calls lock poisoned")
            .len()
    }

    pub fn calls(&self) -> Vec<ActivationCall> {
        self.calls
            .lock()
            .expect("InMemorySubscriptionActivationClient: calls lock poisoned")
            .clone()
    }

    pub fn expiry_for(&self, user_id: &UserId) -> Option<Timestamp> {
        self.entitlements
            .lock()
            .expect("InMemorySubscriptionActivationClient: entitlements lock poisoned")
            .get(user_id)
            .map(|e| e.expires_at)
    }
}

#[async_trait]
impl SubscriptionActivationClient for InMemorySubscriptionActivationClient {
    async fn activate(
        &self,
        user_id: &UserId,
        plan: Plan,
        duration_days: u32,
        correlation_id: &str,
    ) -> Result<Timestamp, ActivationError> {
        self.calls
            .lock()
            .map_err(|_| ActivationError::Unavailable("calls lock poisoned".into()))?
            .push(ActivationCall {
                user_id: user_id.clone(),
                plan,
                duration_days,
                correlation_id: correlation_id.to_string(),
            });

        let scripted = self
            .scripted_failures
            .lock()
            .map_err(|_| ActivationError::Unavailable("failures lock poisoned".into()))?
            .pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        let mut entitlements = self
            .entitlements
            .lock()
            .map_err(|_| ActivationError::Unavailable("entitlements lock poisoned".into()))?;
        let now = Timestamp::now();
        let updated = Entitlement::activate(
            entitlements.remove(user_id),
            user_id.clone(),
            duration_days,
            now,
        );
        let new_expiry = updated.expires_at;
        entitlements.insert(user_id.clone(), updated);
        Ok(new_expiry)
    }
}
