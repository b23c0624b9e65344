//! Authentication types for the domain layer.
//!
//! Token verification is a black box behind the `SessionValidator` port; these
//! types are the identity and role it yields. They carry no provider details.

use super::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role claim carried by access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

/// Authenticated caller extracted from a validated token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the token subject.
    pub id: UserId,

    /// Role granted by the accounts service.
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// User lacks required permissions for this action.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// The verification backend is unavailable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}
