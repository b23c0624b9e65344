//! HS256 JWT adapter for the `SessionValidator` port.
//!
//! Access tokens are issued by the accounts service and signed with a shared
//! secret. This adapter validates:
//! - **Signature**: HMAC-SHA256 with the configured secret
//! - **Issuer (iss)**: Must match the configured issuer
//! - **Expiry (exp)**: Must be in the future
//!
//! The `sub` claim becomes the `UserId` and the `role` claim the `Role`
//! (defaults to `USER` when absent).
//!
//! # Example
//!
//! ```ignore
//! let validator = JwtSessionValidator::new(JwtConfig::new(secret, "nova-accounts"));
//! let user = validator.validate("eyJ...").await?;
//! ```

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, Role, UserId};
use crate::ports::SessionValidator;

/// Configuration for the JWT adapter.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: SecretString, issuer: impl Into<String>) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
        }
    }
}

/// Claims carried by accounts-service tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Validates HS256 access tokens.
pub struct JwtSessionValidator {
    issuer: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
            issuer: config.issuer,
            validation,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!(expected = %self.issuer, "Invalid issuer in token");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            },
        )?;

        let claims = data.claims;
        let user_id = UserId::new(&claims.sub).map_err(|_| {
            tracing::warn!("Token has an empty subject");
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(
            user_id,
            claims.role.unwrap_or(Role::User),
        ))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
