//! HTTP middleware for axum.
//!
//! - `auth` - Bearer token validation and the `RequireAuth` extractor
//! - `internal_key` - `X-INTERNAL-KEY` check for service-to-service routes

pub mod auth;
pub mod internal_key;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
pub use internal_key::{internal_key_middleware, InternalKeyState, INTERNAL_KEY_HEADER};
