//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, require_staff, require_verified, security_audit, track_requests,
};
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        // Request metrics/logging and the security audit run on every
        // route, probes included
        .layer(middleware::from_fn(track_requests))
        .layer(middleware::from_fn(security_audit))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/chat", chat_routes(state.clone()))
        .nest("/shipping", shipping_routes(state))
}

/// Chat routes (protected, verified email required)
fn chat_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/rooms", post(handlers::chat::create_room))
        .route("/rooms/active", get(handlers::chat::get_active_rooms))
        .route("/rooms/{room_uid}/close", post(handlers::chat::close_room))
        .route(
            "/rooms/{room_uid}/messages",
            get(handlers::chat::get_history),
        )
        .route("/messages", post(handlers::chat::send_message))
        .route("/messages/read", post(handlers::chat::mark_read))
        // route_layer applies bottom-up: auth runs first, then the
        // verified-email gate
        .route_layer(middleware::from_fn(require_verified))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Shipping routes (protected; status/tracking restricted to staff)
fn shipping_routes(state: AppState) -> Router<AppState> {
    let staff_routes = Router::new()
        .route(
            "/orders/{order_id}/status",
            post(handlers::shipping::update_status),
        )
        .route(
            "/orders/{order_id}/tracking",
            post(handlers::shipping::assign_tracking),
        )
        .route_layer(middleware::from_fn(require_staff));

    Router::new()
        .route("/addresses", post(handlers::shipping::create_address))
        .route("/addresses", get(handlers::shipping::list_addresses))
        .route("/methods", get(handlers::shipping::list_methods))
        .route("/orders", post(handlers::shipping::create_order))
        .route("/orders", get(handlers::shipping::list_orders))
        .route("/orders/{order_id}", get(handlers::shipping::get_order))
        .route(
            "/orders/{order_id}/estimate",
            post(handlers::shipping::estimate_delivery),
        )
        .merge(staff_routes)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
