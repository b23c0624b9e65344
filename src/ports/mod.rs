//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `PaymentLedger` / `LedgerUnitOfWork` - payment rows with row-level locking
//! - `SubscriptionActivationClient` - entitlement extension downstream
//! - `SessionValidator` - access token verification

mod payment_ledger;
mod session_validator;
mod subscription_activation;

pub use payment_ledger::{LedgerError, LedgerUnitOfWork, PaymentLedger};
pub use session_validator::SessionValidator;
pub use subscription_activation::{ActivationError, SubscriptionActivationClient};
