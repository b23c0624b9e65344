//! Internal API key check for service-to-service routes.
//!
//! Rail callback relays and operators call the internal routes with
//! `X-INTERNAL-KEY`. The comparison is constant-time.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::adapters::http::error::ErrorResponse;
use crate::domain::foundation::ErrorCode;

pub const INTERNAL_KEY_HEADER: &str = "X-INTERNAL-KEY";

/// Expected internal key, shared by the middleware.
pub type InternalKeyState = Arc<SecretString>;

fn key_matches(expected: &SecretString, provided: &str) -> bool {
    let expected = expected.expose_secret().as_bytes();
    !expected.is_empty() && bool::from(expected.ct_eq(provided.as_bytes()))
}

/// Rejects requests whose `X-INTERNAL-KEY` does not match.
pub async fn internal_key_middleware(
    State(expected): State<InternalKeyState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if key_matches(&expected, provided) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected internal call with bad key");
    let body = ErrorResponse::new(ErrorCode::Forbidden.as_str(), "Invalid internal key");
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}
