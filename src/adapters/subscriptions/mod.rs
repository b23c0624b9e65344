//! Subscription activation adapters.

mod http_client;
mod in_memory;

pub use http_client::{HttpSubscriptionActivationClient, SubscriptionsClientConfig};
pub use in_memory::{ActivationCall, InMemorySubscriptionActivationClient};
