//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `NOVA_PAYMENTS` prefix and
//! `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use nova_payments::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.bind_address());
//! ```

mod auth;
mod database;
mod error;
mod payments;
mod server;
mod subscriptions;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payments::PaymentsConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use subscriptions::SubscriptionsConfig;

use std::time::Duration;

use serde::Deserialize;

/// Headroom between the slowest activation call and the sweep treating its
/// `in_progress` record as abandoned.
const ACTIVATION_STALE_MARGIN: Duration = Duration::from_secs(30);

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub auth: AuthConfig,

    pub subscriptions: SubscriptionsConfig,

    #[serde(default)]
    pub payments: PaymentsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `NOVA_PAYMENTS__*` variables:
    ///
    /// - `NOVA_PAYMENTS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `NOVA_PAYMENTS__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("NOVA_PAYMENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.subscriptions.validate(&self.server.environment)?;
        self.payments.validate()?;
        self.validate_stale_after()?;
        Ok(())
    }

    /// The sweep must not reclaim an activation the coordinator is still
    /// running, or the entitlement is extended twice.
    fn validate_stale_after(&self) -> Result<(), ValidationError> {
        let required = self
            .subscriptions
            .worst_case_activation()
            .saturating_add(ACTIVATION_STALE_MARGIN);
        let stale_after = Duration::from_secs(self.payments.activation_stale_after_secs);
        if stale_after <= required {
            return Err(ValidationError::StaleAfterTooShort {
                stale_after_secs: self.payments.activation_stale_after_secs,
                required_secs: required.as_secs(),
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("NOVA_PAYMENTS__DATABASE__URL", "postgresql://test@localhost/payments"),
        ("NOVA_PAYMENTS__AUTH__JWT_SECRET", "test-secret"),
        ("NOVA_PAYMENTS__AUTH__INTERNAL_API_KEY", "internal-key"),
        ("NOVA_PAYMENTS__SUBSCRIPTIONS__BASE_URL", "http://localhost:8081"),
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        env::remove_var("NOVA_PAYMENTS__SERVER__PORT");
        env::remove_var("NOVA_PAYMENTS__SERVER__ENVIRONMENT");
        env::remove_var("NOVA_PAYMENTS__PAYMENTS__SWEEP_BATCH_SIZE");
        env::remove_var("NOVA_PAYMENTS__PAYMENTS__CRYPTO_AMOUNT_TOLERANCE");
        env::remove_var("NOVA_PAYMENTS__PAYMENTS__ACTIVATION_STALE_AFTER_SECS");
        env::remove_var("NOVA_PAYMENTS__SUBSCRIPTIONS__MAX_ATTEMPTS");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/payments");
        assert_eq!(config.auth.internal_api_key.expose_secret(), "internal-key");
        assert_eq!(config.auth.jwt_issuer, "nova-accounts");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_apply_to_missing_sections() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.payments.card_currency, "SEK");
        assert_eq!(config.payments.sweep_batch_size, 50);
        assert_eq!(config.subscriptions.max_attempts, 3);
        assert_eq!(config.database.lock_timeout_ms, 5000);
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("NOVA_PAYMENTS__SERVER__PORT", "3000");
        env::set_var("NOVA_PAYMENTS__PAYMENTS__SWEEP_BATCH_SIZE", "5");
        env::set_var("NOVA_PAYMENTS__PAYMENTS__CRYPTO_AMOUNT_TOLERANCE", "0.000001");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.payments.sweep_batch_size, 5);
        assert_eq!(
            config.payments.crypto_amount_tolerance,
            rust_decimal::Decimal::new(1, 6)
        );
    }

    #[test]
    fn test_production_rejects_weak_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("NOVA_PAYMENTS__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::WeakJwtSecret));
    }

    #[test]
    fn test_stale_after_shorter_than_activation_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("NOVA_PAYMENTS__PAYMENTS__ACTIVATION_STALE_AFTER_SECS", "1");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::StaleAfterTooShort {
                stale_after_secs: 1,
                required_secs: 48,
            })
        );
    }

    #[test]
    fn test_stale_after_tracks_retry_policy() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        // 25 attempts: 125s of timeouts plus 215s of capped backoff.
        env::set_var("NOVA_PAYMENTS__SUBSCRIPTIONS__MAX_ATTEMPTS", "25");
        let result = AppConfig::load();
        clear_env();

        let mut config = result.unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::StaleAfterTooShort { required_secs: 370, .. })
        ));

        config.payments.activation_stale_after_secs = 371;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("NOVA_PAYMENTS__DATABASE__URL");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
