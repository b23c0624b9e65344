//! Subscription entitlement rule applied on activation.

mod entitlement;

pub use entitlement::Entitlement;
