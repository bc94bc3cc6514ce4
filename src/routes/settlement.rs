//! Settlement route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn settlement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/stripe/create-checkout-session",
            post(create_checkout_session),
        )
        .route(
            "/api/bookings/update-payment-status",
            post(update_payment_status),
        )
        .route("/api/stripe/connect", post(connect_account).get(connect_status))
}
