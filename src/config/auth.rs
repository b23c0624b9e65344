//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Token and internal-key settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the accounts service
    pub jwt_secret: SecretString,

    /// Expected `iss` claim
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Key for `X-INTERNAL-KEY`, inbound and outbound
    pub internal_api_key: SecretString,
}

impl AuthConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if self.internal_api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__INTERNAL_API_KEY"));
        }
        if self.jwt_issuer.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_ISSUER"));
        }
        if *environment == Environment::Production && secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ValidationError::WeakJwtSecret);
        }
        Ok(())
    }
}

fn default_jwt_issuer() -> String {
    "nova-accounts".to_string()
}
