//! QR handoff handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::error::ApiError;
use crate::handoff::{
    CollectRequest, CollectResponse, HandoffCoordinator, HandoffFlow, IssuedToken, QrQuery,
    TokenService,
};
use crate::middleware::AuthenticatedUser;

/// Issue the token the lender renders as a QR code
pub async fn generate_qr(
    State(tokens): State<Arc<TokenService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<QrQuery>,
) -> Result<Json<IssuedToken>, ApiError> {
    let flow = query.flow.unwrap_or(HandoffFlow::Borrow);
    let issued = tokens.issue(booking_id, flow, user.user_id).await?;
    Ok(Json(issued))
}

/// Redeem a scanned QR code
pub async fn collect(
    State(coordinator): State<Arc<HandoffCoordinator>>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CollectRequest>,
) -> Result<Json<CollectResponse>, ApiError> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Token is required".to_string()));
    }

    let outcome = coordinator.redeem(token, user.user_id).await?;
    Ok(Json(outcome.into()))
}
