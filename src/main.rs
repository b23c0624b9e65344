use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nova_payments::adapters::http::{payment_router, PaymentAppState};
use nova_payments::adapters::{
    HttpSubscriptionActivationClient, JwtConfig, JwtSessionValidator, PostgresPaymentLedger,
    SubscriptionsClientConfig,
};
use nova_payments::application::handlers::payment::{
    ActivationSweep, ConfirmationCoordinator, EntitlementActivator,
};
use nova_payments::config::{AppConfig, LogFormat};
use nova_payments::ports::{PaymentLedger, SessionValidator, SubscriptionActivationClient};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.server.log_level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        "Starting nova-payments"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate::Migrator::new(Path::new("./migrations"))
            .await?
            .run(&pool)
            .await?;
    }

    let ledger: Arc<dyn PaymentLedger> = Arc::new(PostgresPaymentLedger::new(
        pool.clone(),
        config.database.lock_timeout(),
    ));

    let client: Arc<dyn SubscriptionActivationClient> = Arc::new(
        HttpSubscriptionActivationClient::new(
            SubscriptionsClientConfig::new(
                config.subscriptions.base_url.clone(),
                config.auth.internal_api_key.clone(),
            )
            .with_timeout(config.subscriptions.request_timeout())
            .with_max_attempts(config.subscriptions.max_attempts)
            .with_initial_backoff(config.subscriptions.initial_backoff())
            .with_max_backoff(config.subscriptions.max_backoff()),
        )?,
    );

    let activator = EntitlementActivator::new(ledger.clone(), client);
    let coordinator = ConfirmationCoordinator::new(
        ledger.clone(),
        activator.clone(),
        config.payments.amount_policies()?,
    );
    let sweep = Arc::new(ActivationSweep::with_config(
        ledger.clone(),
        activator,
        config.payments.sweep_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = if config.payments.sweep_enabled {
        let sweep = sweep.clone();
        Some(tokio::spawn(async move { sweep.run(shutdown_rx).await }))
    } else {
        tracing::warn!("Activation sweep disabled; failed activations need operator retry");
        None
    };

    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(JwtConfig::new(
        config.auth.jwt_secret.clone(),
        config.auth.jwt_issuer.clone(),
    )));

    let state = PaymentAppState {
        ledger,
        coordinator,
        sweep,
        card_currency: config.payments.card_currency.clone(),
    };

    let app = payment_router(
        state,
        validator,
        Arc::new(config.auth.internal_api_key.clone()),
    )
    .layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(config.server.request_timeout()))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            tracing::error!("Activation sweep task failed: {}", e);
        }
    }
    pool.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
