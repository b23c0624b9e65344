//! Axum router configuration for payment endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::{
    auth_middleware, internal_key_middleware, AuthState, InternalKeyState,
};

use super::handlers::{
    confirm_payment, create_payment, fail_payment, get_payment_status, health, retry_activation,
    PaymentAppState,
};

/// Service-to-service routes, mounted at `/api/v1/internal/payments`.
///
/// # Routes
/// - `POST /` - Register a PENDING payment
/// - `POST /confirmations` - Rail success callback
/// - `POST /failures` - Rail failure or cancellation callback
/// - `POST /:id/activation` - Operator activation retry
pub fn internal_payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_payment))
        .route("/confirmations", post(confirm_payment))
        .route("/failures", post(fail_payment))
        .route("/:id/activation", post(retry_activation))
}

/// User routes, mounted at `/api/v1/payments`.
///
/// # Routes
/// - `GET /:id` - Payment status for the owning user
pub fn user_payment_routes() -> Router<PaymentAppState> {
    Router::new().route("/:id", get(get_payment_status))
}

/// Complete payment API with middleware and `/health`.
///
/// # Example
///
/// ```ignore
/// let app = payment_router(state, Arc::new(validator), Arc::new(internal_key))
///     .layer(TraceLayer::new_for_http());
/// axum::serve(listener, app).await?;
/// ```
pub fn payment_router(
    state: PaymentAppState,
    validator: AuthState,
    internal_key: InternalKeyState,
) -> Router {
    let internal = internal_payment_routes().route_layer(middleware::from_fn_with_state(
        internal_key,
        internal_key_middleware,
    ));
    let user = user_payment_routes()
        .route_layer(middleware::from_fn_with_state(validator, auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/internal/payments", internal)
        .nest("/api/v1/payments", user)
        .with_state(state)
}
