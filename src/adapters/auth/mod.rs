//! Authentication adapters.
//!
//! - `jwt_validator` - HS256 access tokens issued by the accounts service

mod jwt_validator;

pub use jwt_validator::{AccessClaims, JwtConfig, JwtSessionValidator};
