use dotenv::dotenv;
use mobipay_engine::api::{self, AppState};
use mobipay_engine::config::AppConfig;
use mobipay_engine::logging::init_tracing;
use mobipay_engine::payments::credentials::{EnvSecretsSource, PrefixCredentialResolver};
use mobipay_engine::payments::provider::PaymentProvider;
use mobipay_engine::payments::providers::{
    AfrikpayConfig, AfrikpayProvider, MomoConfig, MomoProvider,
};
use mobipay_engine::payments::registry::{ProviderRegistry, RegistryConfig};
use mobipay_engine::services::{PaymentOrchestrator, WebhookIngestor};
use mobipay_engine::store::postgres::PgTransactionStore;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting mobipay engine"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!("database pool initialization failed: {}", e)
        })?;
    info!("Database connection pool initialized");

    let store = Arc::new(PgTransactionStore::new(pool));

    // Secrets are read from the environment on every call so a rotated
    // credential takes effect without a restart.
    let credentials = Arc::new(PrefixCredentialResolver::new(Arc::new(EnvSecretsSource)));

    let afrikpay = AfrikpayProvider::new(AfrikpayConfig::from_env(), credentials.clone())?;
    let momo = MomoProvider::new(MomoConfig::from_env()?, credentials)?;
    let adapters: Vec<Arc<dyn PaymentProvider>> = vec![Arc::new(afrikpay), Arc::new(momo)];

    let registry = Arc::new(ProviderRegistry::new(
        RegistryConfig {
            default_provider: config.payments.default_provider,
        },
        adapters,
    ));
    info!(providers = ?registry.available(), "payment providers registered");

    let orchestrator = Arc::new(PaymentOrchestrator::new(store, registry.clone()));
    let ingestor = Arc::new(WebhookIngestor::new(registry, orchestrator.clone()));

    let state = Arc::new(AppState {
        orchestrator,
        ingestor,
    });
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(addr = %addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
