//! Booking and handoff route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(create_booking).get(list_bookings))
        .route("/api/bookings/:id", get(get_booking))
        .route("/api/bookings/:id/approve", post(approve_booking))
        .route("/api/bookings/:id/reject", post(reject_booking))
        .route("/api/bookings/:id/cancel", post(cancel_booking))
        .route("/api/bookings/:id/dispute", post(dispute_booking))
        .route("/api/bookings/:id/qr", get(generate_qr))
}

/// QR scan endpoint, rate limited separately
pub fn collect_routes() -> Router<AppState> {
    Router::new().route("/api/bookings/collect", post(collect))
}
