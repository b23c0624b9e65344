//! Payment handlers.
//!
//! ## Commands
//! - Creating PENDING payments for a rail reference
//! - Handling confirmation and failure callbacks
//! - Retrying owed entitlement activations (sweep and operator retry)
//!
//! ## Queries
//! - Payment status for the owning user

mod activation_sweep;
mod confirmation_coordinator;
mod create_pending_payment;
mod entitlement_activator;
mod get_payment_status;
mod reconcile;

// Commands
pub use activation_sweep::{ActivationSweep, ActivationSweepConfig, RetryOutcome, SweepReport};
pub use confirmation_coordinator::{
    ConfirmationCoordinator, ConfirmationOutcome, HandleConfirmationCommand, HandleFailureCommand,
};
pub use create_pending_payment::{
    CreatePendingPaymentCommand, CreatePendingPaymentHandler, CreatePendingPaymentResult,
};
pub use entitlement_activator::{ActivationAttempt, EntitlementActivator};
pub use reconcile::IntentReconciler;

// Queries
pub use get_payment_status::{
    GetPaymentStatusHandler, GetPaymentStatusQuery, GetPaymentStatusResult,
};
