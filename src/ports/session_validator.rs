//! Session validation port for access tokens.
//!
//! Token verification is a black box to the payments core: implementations
//! check signature, issuer and expiry, then yield the caller's identity and
//! role. The HTTP middleware is the only consumer.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Turns a bearer token into the calling user.
///
/// Expired tokens yield `TokenExpired`; every other rejection is
/// `InvalidToken`. `ServiceUnavailable` is reserved for validators that
/// depend on a remote key source.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// `token` excludes the `Bearer ` prefix.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
