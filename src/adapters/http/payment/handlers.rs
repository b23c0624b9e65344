//! HTTP handlers for payment endpoints.
//!
//! These handlers connect Axum routes to the payment command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::payment::{
    ActivationSweep, ConfirmationCoordinator, CreatePendingPaymentCommand,
    CreatePendingPaymentHandler, GetPaymentStatusHandler, GetPaymentStatusQuery,
    HandleConfirmationCommand, HandleFailureCommand,
};
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, UserId};
use crate::domain::payment::{PaymentError, Plan};
use crate::ports::PaymentLedger;

use super::dto::{
    ActivationRetryResponse, CallbackResponse, ConfirmationRequest, CreatePaymentRequest,
    FailureRequest, PaymentResponse, PaymentStatusResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the payment endpoints.
#[derive(Clone)]
pub struct PaymentAppState {
    pub ledger: Arc<dyn PaymentLedger>,
    pub coordinator: ConfirmationCoordinator,
    pub sweep: Arc<ActivationSweep>,
    pub card_currency: String,
}

impl PaymentAppState {
    pub fn create_payment_handler(&self) -> CreatePendingPaymentHandler {
        CreatePendingPaymentHandler::new(self.ledger.clone(), self.card_currency.clone())
    }

    pub fn status_handler(&self) -> GetPaymentStatusHandler {
        GetPaymentStatusHandler::new(self.ledger.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Internal endpoints (internal API key)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/v1/internal/payments - Register a PENDING payment
pub async fn create_payment(
    State(state): State<PaymentAppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = CreatePendingPaymentCommand {
        user_id: UserId::new(request.user_id)?,
        identifier: request.reference.into_identifier()?,
        plan: request.plan.parse::<Plan>()?,
        crypto_amount: request.amount,
    };

    let result = state.create_payment_handler().handle(cmd).await?;
    let status = if result.already_existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(PaymentResponse::from(result))))
}

/// POST /api/v1/internal/payments/confirmations - Rail success callback
pub async fn confirm_payment(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    Json(request): Json<ConfirmationRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = HandleConfirmationCommand {
        identifier: request.reference.into_identifier()?,
        observed_amount: request.observed_amount,
        correlation_id: correlation_id(&headers),
    };

    let outcome = state.coordinator.handle_confirmation(cmd).await?;
    Ok(Json(CallbackResponse::from(outcome)))
}

/// POST /api/v1/internal/payments/failures - Rail failure or cancellation callback
pub async fn fail_payment(
    State(state): State<PaymentAppState>,
    Json(request): Json<FailureRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = HandleFailureCommand {
        identifier: request.reference.into_identifier()?,
        reason: request.reason,
    };

    let outcome = state.coordinator.handle_failure(cmd).await?;
    Ok(Json(CallbackResponse::from(outcome)))
}

/// POST /api/v1/internal/payments/:id/activation - Operator activation retry
pub async fn retry_activation(
    State(state): State<PaymentAppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payment_id = parse_payment_id(&id)?;
    let outcome = state.sweep.retry_payment(payment_id).await?;
    Ok(Json(ActivationRetryResponse::from(outcome)))
}

// ════════════════════════════════════════════════════════════════════════════════
// User endpoints (Bearer token)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/v1/payments/:id - Payment status for the owning user
pub async fn get_payment_status(
    State(state): State<PaymentAppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let query = GetPaymentStatusQuery {
        payment_id: parse_payment_id(&id)?,
        user_id: user.id,
    };

    let result = state.status_handler().handle(query).await?;
    Ok(Json(PaymentStatusResponse::from(result)))
}

/// GET /health - Liveness
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn parse_payment_id(raw: &str) -> Result<PaymentId, PaymentError> {
    raw.parse::<PaymentId>()
        .map_err(|_| PaymentError::validation("id", "must be a UUID"))
}

/// Request id set by `SetRequestIdLayer`, or one supplied by the relay.
fn correlation_id(headers: &HeaderMap) -> Option<String> {
    ["x-request-id", "x-correlation-id"]
        .into_iter()
        .filter_map(|name| headers.get(name)?.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper that converts payment errors to HTTP responses.
#[derive(Debug)]
pub struct PaymentApiError(PaymentError);

impl<E> From<E> for PaymentApiError
where
    E: Into<PaymentError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            PaymentError::NotFound(_) | PaymentError::UnknownPayment { .. } => {
                StatusCode::NOT_FOUND
            }
            PaymentError::DuplicateReference { .. } | PaymentError::NotConfirmed(_) => {
                StatusCode::CONFLICT
            }
            PaymentError::InvalidPlan(_) | PaymentError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::ActivationFailed { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::Store(_) | PaymentError::LockTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        if let PaymentError::Store(msg) = &self.0 {
            tracing::error!(error = %msg, "Ledger store fault");
        }
        let mut error = DomainError::from(self.0);
        if error.code == ErrorCode::DatabaseError {
            error.message = "Payment ledger temporarily unavailable".to_string();
        }

        (status, Json(ErrorResponse::from(error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ValidationError;
    use crate::domain::payment::{ExternalReference, PaymentRail};

    fn status_of(err: PaymentError) -> StatusCode {
        PaymentApiError(err).into_response().status()
    }

    #[test]
    fn correlation_id_prefers_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", "relay-1".parse().unwrap());
        assert_eq!(correlation_id(&headers).as_deref(), Some("relay-1"));

        headers.insert("x-request-id", "req-1".parse().unwrap());
        assert_eq!(correlation_id(&headers).as_deref(), Some("req-1"));

        assert_eq!(correlation_id(&HeaderMap::new()), None);
    }

    #[test]
    fn store_faults_map_to_service_unavailable() {
        assert_eq!(
            status_of(PaymentError::store("pool timed out")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(PaymentError::lock_timeout("55P03")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn lookup_errors_map_to_not_found() {
        assert_eq!(
            status_of(PaymentError::not_found(PaymentId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PaymentError::unknown_payment(
                PaymentRail::Card,
                ExternalReference::new("pi_x").unwrap()
            )),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn duplicate_reference_maps_to_conflict() {
        assert_eq!(
            status_of(PaymentError::duplicate_reference(
                PaymentRail::Crypto,
                ExternalReference::new("44Ab#1").unwrap()
            )),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err: PaymentApiError = ValidationError::empty_field("user_id").into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(PaymentError::invalid_plan("weekly")),
            StatusCode::BAD_REQUEST
        );
    }

    async fn body_of(err: PaymentError) -> serde_json::Value {
        let response = PaymentApiError(err).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_body_carries_domain_details() {
        let body = body_of(PaymentError::duplicate_reference(
            PaymentRail::Crypto,
            ExternalReference::new("44Ab#1").unwrap(),
        ))
        .await;
        assert_eq!(body["error_code"], "DUPLICATE_REFERENCE");
        assert_eq!(body["details"]["rail"], "crypto");
        assert_eq!(body["details"]["reference"], "44Ab#1");
    }

    #[tokio::test]
    async fn store_fault_body_hides_cause() {
        let body = body_of(PaymentError::store("password authentication failed")).await;
        assert_eq!(body["error_code"], "DATABASE_ERROR");
        assert_eq!(body["message"], "Payment ledger temporarily unavailable");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn malformed_payment_id_is_a_validation_error() {
        let err = parse_payment_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, PaymentError::ValidationFailed { .. }));
    }
}
