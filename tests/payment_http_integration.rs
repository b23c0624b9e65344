//! Integration tests for the payment HTTP endpoints.
//!
//! These tests drive the full axum router with `oneshot`:
//! 1. Internal routes require the internal key
//! 2. Creation, confirmation and failure callbacks return outcome strings
//! 3. The status route requires a valid token and only shows owned payments

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use nova_payments::adapters::auth::AccessClaims;
use nova_payments::adapters::http::{payment_router, PaymentAppState};
use nova_payments::adapters::{
    InMemoryPaymentLedger, InMemorySubscriptionActivationClient, JwtConfig, JwtSessionValidator,
};
use nova_payments::application::handlers::payment::{
    ActivationSweep, ConfirmationCoordinator, EntitlementActivator,
};
use nova_payments::domain::payment::AmountPolicies;
use nova_payments::ports::{PaymentLedger, SessionValidator};

// =============================================================================
// Test Infrastructure
// =============================================================================

const INTERNAL_KEY: &str = "internal-test-key";
const JWT_SECRET: &str = "jwt-test-secret";
const ISSUER: &str = "nova-accounts";

struct TestApp {
    router: Router,
    ledger: InMemoryPaymentLedger,
    client: Arc<InMemorySubscriptionActivationClient>,
}

fn app() -> TestApp {
    let ledger = InMemoryPaymentLedger::new();
    let shared: Arc<dyn PaymentLedger> = Arc::new(ledger.clone());
    let client = Arc::new(InMemorySubscriptionActivationClient::new());
    let activator = EntitlementActivator::new(shared.clone(), client.clone());

    let state = PaymentAppState {
        ledger: shared.clone(),
        coordinator: ConfirmationCoordinator::new(
            shared.clone(),
            activator.clone(),
            AmountPolicies::default(),
        ),
        sweep: Arc::new(ActivationSweep::new(shared, activator)),
        card_currency: "SEK".to_string(),
    };
    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(
        JwtConfig::new(SecretString::new(JWT_SECRET.to_string()), ISSUER),
    ));

    TestApp {
        router: payment_router(
            state,
            validator,
            Arc::new(SecretString::new(INTERNAL_KEY.to_string())),
        ),
        ledger,
        client,
    }
}

fn token_for(user: &str) -> String {
    let claims = AccessClaims {
        sub: user.to_string(),
        iss: ISSUER.to_string(),
        exp: chrono::Utc::now().timestamp() + 600,
        iat: None,
        role: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn internal_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-INTERNAL-KEY", INTERNAL_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_card_payment(app: &TestApp, user: &str, intent_id: &str) -> Value {
    let (status, body) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments",
            json!({
                "user_id": user,
                "rail": "card",
                "intent_id": intent_id,
                "plan": "monthly"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn internal_routes_reject_missing_or_wrong_key() {
    let app = app();
    let body = json!({"rail": "card", "intent_id": "pi_1", "observed_amount": "4900"});

    let missing = Request::builder()
        .method("POST")
        .uri("/api/v1/internal/payments/confirmations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, error) = send(&app.router, missing).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error_code"], "FORBIDDEN");

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/v1/internal/payments/confirmations")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-INTERNAL-KEY", "guess")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app.router, wrong).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.client.call_count(), 0);
}

// =============================================================================
// Creation and callbacks
// =============================================================================

#[tokio::test]
async fn create_then_confirm_then_replay() {
    let app = app();
    let created = create_card_payment(&app, "user-1", "pi_http").await;
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["amount"], "4900");
    assert_eq!(created["currency"], "SEK");
    assert_eq!(created["duration_days"], 30);
    assert_eq!(created["already_existed"], false);

    let confirm = json!({"rail": "card", "intent_id": "pi_http", "observed_amount": "4900"});
    let (status, first) = send(
        &app.router,
        internal_post("/api/v1/internal/payments/confirmations", confirm.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "confirmed");
    assert_eq!(first["payment_id"], created["id"]);
    assert!(first["new_expiry"].is_string());

    let (_, replay) = send(
        &app.router,
        internal_post("/api/v1/internal/payments/confirmations", confirm),
    )
    .await;
    assert_eq!(replay["status"], "already-finalized");
    assert_eq!(app.client.call_count(), 1);
}

#[tokio::test]
async fn confirmation_forwards_request_id_to_subscriptions() {
    let app = app();
    create_card_payment(&app, "user-1", "pi_corr").await;

    let mut request = internal_post(
        "/api/v1/internal/payments/confirmations",
        json!({"rail": "card", "intent_id": "pi_corr", "observed_amount": "4900"}),
    );
    request
        .headers_mut()
        .insert("x-request-id", "req-relay-42".parse().unwrap());
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let calls = app.client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].correlation_id, "req-relay-42");
}

#[tokio::test]
async fn duplicate_creation_returns_existing_with_ok() {
    let app = app();
    let created = create_card_payment(&app, "user-1", "pi_twice").await;

    let (status, again) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments",
            json!({"user_id": "user-1", "rail": "card", "intent_id": "pi_twice", "plan": "monthly"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], created["id"]);
    assert_eq!(again["already_existed"], true);
    assert_eq!(app.ledger.payment_count(), 1);
}

#[tokio::test]
async fn invalid_plan_is_bad_request() {
    let app = app();
    let (status, body) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments",
            json!({"user_id": "user-1", "rail": "card", "intent_id": "pi_x", "plan": "weekly"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_PLAN");
}

#[tokio::test]
async fn failure_callback_and_unknown_reference() {
    let app = app();
    create_card_payment(&app, "user-2", "pi_declined").await;

    let (_, failed) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments/failures",
            json!({"rail": "card", "intent_id": "pi_declined", "reason": "card_declined"}),
        ),
    )
    .await;
    assert_eq!(failed["status"], "failed");

    let (status, unknown) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments/confirmations",
            json!({"rail": "card", "intent_id": "pi_ghost", "observed_amount": "4900"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown, json!({"status": "unknown"}));
    assert_eq!(app.ledger.payment_count(), 1);
}

#[tokio::test]
async fn store_outage_returns_service_unavailable() {
    let app = app();
    create_card_payment(&app, "user-3", "pi_down").await;
    app.ledger.set_unavailable(true);

    let (status, body) = send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments/confirmations",
            json!({"rail": "card", "intent_id": "pi_down", "observed_amount": "4900"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "DATABASE_ERROR");
}

#[tokio::test]
async fn operator_retry_reports_already_activated() {
    let app = app();
    let created = create_card_payment(&app, "user-4", "pi_ops").await;
    send(
        &app.router,
        internal_post(
            "/api/v1/internal/payments/confirmations",
            json!({"rail": "card", "intent_id": "pi_ops", "observed_amount": "4900"}),
        ),
    )
    .await;

    let id = created["id"].as_str().unwrap();
    let (status, body) = send(
        &app.router,
        internal_post(&format!("/api/v1/internal/payments/{}/activation", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already-activated");
    assert_eq!(app.client.call_count(), 1);
}

// =============================================================================
// Status query
// =============================================================================

#[tokio::test]
async fn owner_sees_status_and_others_get_not_found() {
    let app = app();
    let created = create_card_payment(&app, "owner-1", "pi_status").await;
    let uri = format!("/api/v1/payments/{}", created["id"].as_str().unwrap());

    let owner = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for("owner-1")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["rail"], "card");
    assert!(body["confirmed_at"].is_null());

    let stranger = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for("stranger")))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, stranger).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "PAYMENT_NOT_FOUND");
}

#[tokio::test]
async fn status_requires_valid_token() {
    let app = app();
    let created = create_card_payment(&app, "owner-2", "pi_auth").await;
    let uri = format!("/api/v1/payments/{}", created["id"].as_str().unwrap());

    let anonymous = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, _) = send(&app.router, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "UNAUTHORIZED");
}
