//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, state machine)
//! - `payment` - Payment ledger rows, transitions, and activation bookkeeping
//! - `subscription` - Entitlement extension rule

pub mod foundation;
pub mod payment;
pub mod subscription;
