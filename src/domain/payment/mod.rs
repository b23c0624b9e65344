//! Payment module - ledger rows, their state machine, and rail identifiers.
//!
//! # Module Structure
//!
//! - `aggregate` - `Payment` and its confirm/fail/settle transitions
//! - `status` - `PaymentStatus` state machine
//! - `rail` - payment rails and external references
//! - `plan` - plans and pricing
//! - `amount_policy` - amount-mismatch tolerance per rail
//! - `activation` - activation bookkeeping for confirmed payments
//! - `errors` - payment-specific errors

mod activation;
mod aggregate;
mod amount_policy;
mod errors;
mod plan;
mod rail;
mod status;

pub use activation::{ActivationRecord, ActivationState};
pub use aggregate::{FailureReason, Payment, TransitionOutcome};
pub use amount_policy::{AmountCheck, AmountPolicies, AmountPolicy};
pub use errors::PaymentError;
pub use plan::{validate_crypto_amount, Plan, CRYPTO_ASSET, CRYPTO_DECIMALS};
pub use rail::{ExternalReference, PaymentRail, RailIdentifier};
pub use status::PaymentStatus;
