//! Entitlement window a confirmed payment grants or extends.

use crate::domain::foundation::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A user's subscription access window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub user_id: UserId,
    pub starts_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Entitlement {
    /// Fresh window of `duration_days` starting at `now`.
    pub fn start(user_id: UserId, duration_days: u32, now: Timestamp) -> Self {
        Self {
            user_id,
            starts_at: now,
            expires_at: now.add_days(i64::from(duration_days)),
        }
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires_at.is_after(&now)
    }

    /// Adds `duration_days` to the later of the current expiry and `now`.
    ///
    /// A lapsed entitlement restarts its window at `now`.
    pub fn extend(&mut self, duration_days: u32, now: Timestamp) -> Timestamp {
        if !self.is_active(now) {
            self.starts_at = now;
        }
        self.expires_at = self
            .expires_at
            .latest(now)
            .add_days(i64::from(duration_days));
        self.expires_at
    }

    /// Applies an activation to an optional existing entitlement.
    pub fn activate(
        existing: Option<Entitlement>,
        user_id: UserId,
        duration_days: u32,
        now: Timestamp,
    ) -> Entitlement {
        match existing {
            Some(mut entitlement) => {
                entitlement.extend(duration_days, now);
                entitlement
            }
            None => Entitlement::start(user_id, duration_days, now),
        }
    }
}
