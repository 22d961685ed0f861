use malipo_backend::api::{self, AppState};
use malipo_backend::config::AppConfig;
use malipo_backend::gateway::{GatewayApi, PesapalClient};
use malipo_backend::health;
use malipo_backend::logging::init_tracing;
use malipo_backend::services::{
    CallbackProcessor, EventSink, InitiationService, PgNotificationQueue, StatusReconciler,
};
use malipo_backend::store::{self, PgTransactionStore, TransactionStore};
use malipo_backend::workers::{NotificationWorker, SweepConfig, SweepWorker};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

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

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "🚀 Starting malipo backend service"
    );

    let pool = store::init_pool_from_config(&config.database).await?;
    info!("✅ Database connection pool initialized");

    let gateway: Arc<dyn GatewayApi> = Arc::new(PesapalClient::new(config.pesapal.clone())?);
    info!(base_url = %config.pesapal.base_url, "✅ Pesapal client initialized");

    let transactions: Arc<dyn TransactionStore> = Arc::new(PgTransactionStore::new(pool.clone()));
    let queue = Arc::new(PgNotificationQueue::new(pool.clone()));
    let sink: Arc<dyn EventSink> = queue.clone();

    let reconciler = Arc::new(StatusReconciler::new(transactions.clone(), sink));
    let initiation = Arc::new(InitiationService::new(
        transactions.clone(),
        gateway.clone(),
        config.pesapal.clone(),
    ));
    let callbacks = Arc::new(CallbackProcessor::new(
        transactions.clone(),
        gateway.clone(),
        reconciler.clone(),
    ));

    // Background workers share one shutdown signal with the HTTP server.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep = SweepWorker::new(
        transactions.clone(),
        gateway.clone(),
        reconciler.clone(),
        SweepConfig::from(&config.sweep),
    );
    tokio::spawn(sweep.run(shutdown_rx.clone()));

    let notifier = NotificationWorker::new(queue.clone(), &config.notifier);
    tokio::spawn(notifier.run(shutdown_rx.clone()));

    let state = AppState {
        initiation,
        callbacks,
    };

    let app = api::router(state)
        .merge(health::router(pool.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(addr = %addr, "✅ HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx))
        .await?;

    info!("Server stopped");
    Ok(())
}
