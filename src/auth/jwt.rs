//! Session token verification
//!
//! Users sign in with the marketplace identity provider, which issues HS256
//! session JWTs. This service only verifies them; it never mints sessions
//! outside of tests and local tooling.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Session-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Claims of an identity-provider session
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<Uuid, SessionError> {
        Uuid::parse_str(&self.sub).map_err(|e| SessionError::InvalidToken(e.to_string()))
    }
}

/// Verifies session JWTs against the identity provider's shared secret
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Verify and decode a session token
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Identity providers commonly set an audience we do not pin
        validation.validate_aud = false;

        let token_data =
            decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired,
                    _ => SessionError::DecodingFailed(e.to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}

/// Mint a session token, as the identity provider would
///
/// # Arguments
/// * `user_id` - Subject of the session
/// * `email` - Optional email claim
/// * `secret` - Shared signing secret
/// * `ttl_seconds` - Token time-to-live in seconds
pub fn generate_session_token(
    user_id: Uuid,
    email: Option<&str>,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, SessionError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        email: email.map(str::to_string),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SessionError::EncodingFailed(e.to_string()))
}
