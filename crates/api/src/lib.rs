//! HTTP API server for order placement and payment reconciliation.
//!
//! Provides REST endpoints for placing orders, reconciling gateway
//! callbacks and administering orders, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/payments/verify", post(routes::payments::verify::<S>))
        .route("/payments/cancel", post(routes::payments::cancel::<S>))
        .route("/coupons", get(routes::coupons::list::<S>))
        .route("/coupons/validate", post(routes::coupons::validate::<S>))
        .route("/admin/orders", get(routes::admin::list::<S>))
        .route(
            "/admin/orders/{id}",
            axum::routing::delete(routes::admin::delete::<S>),
        )
        .route(
            "/admin/orders/{id}/status",
            patch(routes::admin::update_status::<S>),
        )
        .route(
            "/admin/orders/{id}/payment-logs",
            get(routes::admin::payment_logs::<S>),
        )
        .route("/admin/payments/sweep", post(routes::admin::sweep::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
