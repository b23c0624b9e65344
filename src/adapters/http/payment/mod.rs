//! HTTP adapter for payment endpoints.
//!
//! Internal (X-INTERNAL-KEY):
//! - `POST /api/v1/internal/payments` - Register a PENDING payment
//! - `POST /api/v1/internal/payments/confirmations` - Rail success callback
//! - `POST /api/v1/internal/payments/failures` - Rail failure callback
//! - `POST /api/v1/internal/payments/:id/activation` - Operator activation retry
//!
//! User (Bearer token):
//! - `GET /api/v1/payments/:id` - Payment status

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{PaymentApiError, PaymentAppState};
pub use routes::{internal_payment_routes, payment_router, user_payment_routes};
