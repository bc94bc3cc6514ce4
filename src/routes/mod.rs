//! Route definitions for the rental handoff API

mod bookings;
mod settlement;

pub use bookings::{booking_routes, collect_routes};
pub use settlement::settlement_routes;

use axum::{middleware::from_fn, routing::get, Router};
use tower::ServiceBuilder;

use crate::handlers::health_check;
use crate::middleware::{self, RateLimiter};
use crate::state::AppState;

/// Full API router without CORS, which depends on deployment configuration
pub fn api_router(state: AppState, global_limiter: RateLimiter, scan_limiter: RateLimiter) -> Router {
    let collect = collect_routes().route_layer(from_fn(move |req, next| {
        let limiter = scan_limiter.clone();
        middleware::rate_limit_layer(limiter)(req, next)
    }));

    Router::new()
        .route("/health", get(health_check))
        .merge(booking_routes())
        .merge(collect)
        .merge(settlement_routes())
        .with_state(state)
        .layer(
            // Outermost first
            ServiceBuilder::new()
                .layer(from_fn(move |req, next| {
                    let limiter = global_limiter.clone();
                    middleware::rate_limit_layer(limiter)(req, next)
                }))
                .layer(from_fn(middleware::request_tracing))
                .layer(from_fn(middleware::security_headers)),
        )
}
