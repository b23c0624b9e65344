//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the payments core to external systems:
//! - `postgres` - Payment ledger on PostgreSQL
//! - `memory` - In-memory ledger for tests and local development
//! - `subscriptions` - Subscriptions service activation client
//! - `auth` - Access token validation
//! - `http` - REST API (axum)

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod subscriptions;

pub use auth::{JwtConfig, JwtSessionValidator};
pub use memory::InMemoryPaymentLedger;
pub use postgres::PostgresPaymentLedger;
pub use subscriptions::{
    HttpSubscriptionActivationClient, InMemorySubscriptionActivationClient,
    SubscriptionsClientConfig,
};
