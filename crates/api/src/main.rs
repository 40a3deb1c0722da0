//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::Config;
use checkout::services::RazorpayGateway;
use checkout::{CheckoutConfig, Clock, Collaborators, InMemoryCollaborators, SystemClock};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{CommerceStore, InMemoryStore, PostgresStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Serves the API on `store` until a shutdown signal arrives, running the
/// timeout sweeper alongside.
async fn serve<S: CommerceStore + Clone + 'static>(
    store: S,
    backend: &'static str,
    config: &Config,
    checkout_config: CheckoutConfig,
    collaborators: Collaborators,
    metrics_handle: PrometheusHandle,
) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState::new(
        store,
        collaborators,
        clock,
        checkout_config,
        backend,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = Arc::clone(&state.sweeper).spawn(shutdown_rx);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, store = backend, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_task.await {
        tracing::error!(error = %e, "sweeper task panicked");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire collaborators; the gateway is real when credentials are configured
    let fakes = InMemoryCollaborators::new(config.gateway_key_secret.clone());
    let mut collaborators = fakes.collaborators();
    match config.gateway() {
        Some(gateway) => {
            let gateway = RazorpayGateway::new(gateway).expect("failed to build gateway client");
            collaborators.gateway = Arc::new(gateway);
        }
        None => tracing::warn!("GATEWAY_KEY_ID not set, using the in-memory payment gateway"),
    }

    // 4. Pick the store and serve
    let checkout_config = config.checkout();
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(
                store,
                "postgres",
                &config,
                checkout_config,
                collaborators,
                metrics_handle,
            )
            .await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            serve(
                InMemoryStore::new(),
                "memory",
                &config,
                checkout_config,
                collaborators,
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
