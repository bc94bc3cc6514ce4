//! Authentication middleware
//!
//! Extracts the signed-in user from the identity provider's bearer token.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{SessionError, SessionVerifier};
use crate::error::ApiError;

/// Authenticated user extracted from the session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<SessionVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthenticated(
                        "Authorization header with Bearer token required".to_string(),
                    )
                })?;

        let verifier = Arc::<SessionVerifier>::from_ref(state);

        let claims = verifier.verify(bearer.token()).map_err(|e| {
            let message = match e {
                SessionError::TokenExpired => "Session has expired",
                _ => "Invalid session token",
            };
            ApiError::Unauthenticated(message.to_string())
        })?;

        let user_id = claims
            .user_id()
            .map_err(|_| ApiError::Unauthenticated("Invalid user ID in token".to_string()))?;

        Ok(AuthenticatedUser {
            user_id,
            email: claims.email,
        })
    }
}
