//! HTTP gateway for the order-management services.
//!
//! Each request is translated into one command on the owning service's
//! command channel. Domain rejections become 400 (creates) or 404 (reads and
//! updates); transport failures become 503 or 504. Structured logging via
//! tracing and Prometheus metrics on `/metrics`.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use gateway::Gateway;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(gateway: Arc<Gateway>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/product", post(routes::product::create).get(routes::product::list))
        .route(
            "/product/{pk}",
            get(routes::product::get)
                .put(routes::product::update)
                .delete(routes::product::delete),
        )
        .route("/product/{pk}/details", get(routes::product::details))
        .route("/customer", post(routes::customer::create))
        .route("/customer/{pk}", get(routes::customer::get))
        .route(
            "/warehouse",
            post(routes::inventory::create_warehouse).get(routes::inventory::list_warehouses),
        )
        .route("/inventory", post(routes::inventory::create))
        .route("/inventory/{product_pk}", get(routes::inventory::get))
        .route(
            "/inventory/{warehouse_pk}/{product_pk}",
            patch(routes::inventory::update),
        )
        .route("/pricing", post(routes::pricing::create))
        .route(
            "/pricing/{product_pk}",
            get(routes::pricing::get).put(routes::pricing::update),
        )
        .route("/order", post(routes::order::create))
        .route("/order/{pk}", get(routes::order::get).patch(routes::order::update))
        .with_state(gateway)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
