use spicecart_backend::api::{self, AppState};
use spicecart_backend::config::AppConfig;
use spicecart_backend::database::order_repository::OrderRepository;
use spicecart_backend::database::payment_repository::PaymentRepository;
use spicecart_backend::database::repository::{OrderStore, PaymentStore};
use spicecart_backend::database::init_pool_from_config;
use spicecart_backend::gateway::phonepe::{PhonePeClient, PhonePeConfig};
use spicecart_backend::gateway::provider::PaymentGateway;
use spicecart_backend::health::HealthChecker;
use spicecart_backend::logging::init_tracing;
use spicecart_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use spicecart_backend::services::initiation::PaymentInitiationService;
use spicecart_backend::services::payment_status::PaymentStatusService;
use spicecart_backend::services::status_resolver::StatusResolver;
use spicecart_backend::workers::reconciliation::{ReconciliationConfig, ReconciliationSweeper};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
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
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting storefront payment backend"
    );

    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;

    // Gateway credentials are validated here: a missing merchant id or salt
    // key is a startup failure, never a silent fallback.
    let gateway_config = PhonePeConfig::from_env().map_err(|e| {
        error!("Failed to load payment gateway configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    let gateway_environment = gateway_config.environment;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PhonePeClient::new(gateway_config).map_err(|e| {
        error!("Failed to initialize payment gateway: {}", e);
        anyhow::anyhow!(e)
    })?);

    let payments: Arc<dyn PaymentStore> = Arc::new(PaymentRepository::new(db_pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool.clone()));
    let resolver = Arc::new(StatusResolver::new(payments.clone(), orders.clone()));

    let initiation = Arc::new(PaymentInitiationService::new(
        payments.clone(),
        gateway.clone(),
        gateway_environment,
        config.server.webhook_callback_url(),
    ));
    let status = Arc::new(PaymentStatusService::new(
        payments.clone(),
        gateway.clone(),
        resolver.clone(),
    ));
    let sweeper = Arc::new(ReconciliationSweeper::new(
        payments.clone(),
        orders.clone(),
        gateway.clone(),
        resolver.clone(),
        ReconciliationConfig::from_env(),
    ));
    let health = HealthChecker::new(Some(db_pool.clone()));

    // The periodic sweeper is optional; deployments that drive the
    // reconciliation endpoint from an external scheduler can disable it.
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let sweeper_enabled = std::env::var("RECONCILE_WORKER_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let sweeper_handle = if sweeper_enabled {
        let worker = sweeper.clone();
        Some(tokio::spawn(async move {
            worker.run(worker_shutdown_rx).await;
        }))
    } else {
        info!("reconciliation worker disabled (RECONCILE_WORKER_ENABLED=false)");
        None
    };

    let state = AppState {
        initiation,
        status,
        resolver,
        gateway,
        sweeper,
        health,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "payment backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }

    info!("shutdown complete");
    Ok(())
}
