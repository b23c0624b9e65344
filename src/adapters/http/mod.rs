//! HTTP adapters - REST API implementations.

pub mod error;
pub mod middleware;
pub mod payment;

pub use error::ErrorResponse;
pub use payment::{payment_router, PaymentAppState};
