//! API handlers for the rental handoff service

pub mod bookings;
pub mod extract;
pub mod handoff;
pub mod settlement;

pub use bookings::*;
pub use handoff::*;
pub use settlement::*;

use axum::{extract::State, http::StatusCode, Json};

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db_pool {
        Some(pool) => match crate::db::check_health(pool).await {
            Ok(()) => "connected".to_string(),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                "unreachable".to_string()
            }
        },
        None => "in-memory".to_string(),
    };

    let healthy = database != "unreachable";
    let settlement = if state.settlement_gateway.is_sandbox() {
        "sandbox"
    } else {
        "live"
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            database,
            settlement: settlement.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
