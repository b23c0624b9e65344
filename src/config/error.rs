//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Lock timeout must be between 1 and 60000 ms")]
    InvalidLockTimeout,

    #[error("JWT secret must be at least 32 bytes in production")]
    WeakJwtSecret,

    #[error("Invalid subscriptions service URL")]
    InvalidSubscriptionsUrl,

    #[error("Subscriptions service URL must use HTTPS in production")]
    SubscriptionsUrlMustBeHttps,

    #[error("Activation retry policy needs at least one attempt")]
    InvalidRetryPolicy,

    #[error("Amount tolerance must not be negative")]
    NegativeTolerance,

    #[error("Card currency must be a three-letter ISO code")]
    InvalidCurrency,

    #[error("Sweep interval and batch size must be positive")]
    InvalidSweepConfig,

    #[error(
        "Activation stale_after ({stale_after_secs}s) must exceed the worst-case activation call plus margin ({required_secs}s)"
    )]
    StaleAfterTooShort {
        stale_after_secs: u64,
        required_secs: u64,
    },
}
