//! Nova Payments - payment confirmation and subscription activation
//!
//! Records pending payments per rail, confirms or fails them exactly once
//! when the rail reports back, and extends the user's subscription after a
//! confirmation. Activation that fails after confirmation is retried by a
//! background sweep rather than by the rail.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
