//! Settlement handlers

use axum::{extract::State, Json};
use std::sync::Arc;
use validator::Validate;

use super::extract::ApiJson;
use crate::booking::Booking;
use crate::error::{ApiError, BookingError};
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::settlement::{
    CheckoutSession, CreateSessionRequest, PaymentOutcome, PayoutAccount, PayoutStatus,
    SettlementGateway, UpdatePaymentStatusRequest,
};

pub async fn create_checkout_session(
    State(gateway): State<Arc<SettlementGateway>>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateSessionRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let session = gateway
        .create_session(user.user_id, user.email.as_deref(), request)
        .await?;
    Ok(Json(session))
}

/// Return-page callback reporting the checkout outcome
pub async fn update_payment_status(
    State(gateway): State<Arc<SettlementGateway>>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    request.validate().map_err(BookingError::from)?;

    let booking = match request.outcome {
        PaymentOutcome::Paid => {
            gateway
                .confirm_payment(user.user_id, request.booking_id, &request.session_id)
                .await?
        }
        PaymentOutcome::Failed => {
            gateway
                .record_payment_failure(user.user_id, request.booking_id, &request.session_id)
                .await?
        }
    };

    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn connect_account(
    State(gateway): State<Arc<SettlementGateway>>,
    user: AuthenticatedUser,
) -> Result<Json<PayoutAccount>, ApiError> {
    let account = gateway
        .connect_payout_account(user.user_id, user.email.as_deref())
        .await?;
    Ok(Json(account))
}

pub async fn connect_status(
    State(gateway): State<Arc<SettlementGateway>>,
    user: AuthenticatedUser,
) -> Result<Json<PayoutStatus>, ApiError> {
    Ok(Json(gateway.payout_status(user.user_id).await?))
}
