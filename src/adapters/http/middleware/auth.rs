//! Bearer-token check for the user-facing payment routes.
//!
//! `auth_middleware` resolves the token through the `SessionValidator` port
//! and stores the resulting `AuthenticatedUser` in request extensions.
//! Handlers that need a caller take the `RequireAuth` extractor.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::domain::foundation::{AuthError, AuthenticatedUser, ErrorCode};
use crate::ports::SessionValidator;

pub type AuthState = Arc<dyn SessionValidator>;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn rejection_for(err: &AuthError) -> (StatusCode, &'static str) {
    match err {
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
        AuthError::ServiceUnavailable(reason) => {
            tracing::error!(reason = %reason, "Token validation unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication temporarily unavailable",
            )
        }
        AuthError::InvalidToken | AuthError::InsufficientPermissions => {
            (StatusCode::UNAUTHORIZED, "Invalid token")
        }
    }
}

/// Validates `Authorization: Bearer <token>` when present.
///
/// A request without a token is forwarded unchanged and fails later in
/// `RequireAuth`. A token that does not validate is answered here.
pub async fn auth_middleware(
    State(validator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers());
    let Some(token) = token else {
        return next.run(request).await;
    };

    match validator.validate(token).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            let (status, message) = rejection_for(&err);
            let body = ErrorResponse::new(ErrorCode::Unauthorized.as_str(), message);
            (status, Json(body)).into_response()
        }
    }
}

/// The authenticated caller; rejects with 401 when the middleware found none.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let user = parts.extensions.get::<AuthenticatedUser>().cloned();
        Box::pin(async move { user.map(RequireAuth).ok_or(AuthRejection::Unauthenticated) })
    }
}

#[derive(Debug, Clone)]
pub enum AuthRejection {
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(
            ErrorCode::Unauthorized.as_str(),
            "Authentication required",
        );
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
