//! Educora billing service entry point.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use educora_billing::adapters::http::{billing_router, BillingAppState};
use educora_billing::adapters::memory::{
    InMemoryInvoiceRepository, InMemorySubscriptionRepository, InMemoryWebhookEventRepository,
};
use educora_billing::adapters::postgres::{
    run_migrations, PostgresInvoiceRepository, PostgresSubscriptionRepository,
    PostgresWebhookEventRepository,
};
use educora_billing::adapters::stripe::{StripeBillingClient, StripeConfig};
use educora_billing::config::{AppConfig, ConfigError, StorageBackend, ValidationError};
use educora_billing::domain::billing::{PlanResolver, StripeWebhookVerifier};
use educora_billing::ports::{
    InvoiceRepository, PaymentError, SubscriptionRepository, WebhookEventRepository,
};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("billing client setup failed: {0}")]
    Provider(#[from] PaymentError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

struct Repositories {
    subscriptions: Arc<dyn SubscriptionRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load_validated()?;
    init_tracing(&config);

    let repositories = connect_storage(&config).await?;
    let plan_resolver = Arc::new(PlanResolver::new(config.payment.price_tier_table()?));

    let stripe = StripeConfig::new(config.payment.api_key())
        .with_base_url(config.payment.api_base_url.clone());
    let billing_provider = Arc::new(StripeBillingClient::new(stripe)?);

    let verifier = StripeWebhookVerifier::new(config.payment.webhook_secret())
        .with_tolerance(config.payment.signature_tolerance_secs);

    let state = BillingAppState {
        subscription_repository: repositories.subscriptions,
        invoice_repository: repositories.invoices,
        webhook_event_repository: repositories.webhook_events,
        billing_provider,
        plan_resolver,
        verifier,
        checkout_retry: config.payment.checkout_retry_policy(),
        frontend_url: config.payment.frontend_url.clone(),
        admin_token: config.server.admin_token.clone().map(SecretString::new),
    };

    let app = billing_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        storage = ?config.storage.backend,
        test_mode = config.payment.is_test_mode(),
        "Educora billing listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_storage(config: &AppConfig) -> Result<Repositories, StartupError> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = config.database.connect().await?;
            tracing::info!("Connected to PostgreSQL");

            if config.database.run_migrations {
                run_migrations(&pool).await?;
                tracing::info!("Migrations applied");
            }

            Ok(Repositories {
                subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
                invoices: Arc::new(PostgresInvoiceRepository::new(pool.clone())),
                webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            Ok(Repositories {
                subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
                invoices: Arc::new(InMemoryInvoiceRepository::new()),
                webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            })
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
