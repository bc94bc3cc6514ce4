//! Collection token issuance and verification
//!
//! A collection token is an HS256 JWT binding a booking, the fixed "collect"
//! action, a flow and the issuing user. The raw token is only ever returned
//! to the issuer for QR rendering; the booking row keeps its SHA-256 hex
//! digest and expiry. A valid signature proves the claims are authentic, the
//! digest match proves the token is the live, unused one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::model::HandoffFlow;
use crate::booking::{Booking, BookingChange, BookingStatus, BookingStore, TokenFixture};
use crate::error::BookingError;

/// The only action a collection token may carry
pub const COLLECT_ACTION: &str = "collect";

/// JWT claims of a collection token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CollectionClaims {
    pub booking_id: i64,
    pub action: String,
    pub flow: HandoffFlow,
    /// User id of the party displaying the QR
    pub issuer: Uuid,
    pub iat: i64,
    pub exp: i64,
    /// Random nonce so tokens minted within the same second differ
    pub jti: String,
}

/// Freshly issued token, returned to the issuer only
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub booking_id: i64,
    pub flow: HandoffFlow,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

/// Claims recovered from a consumed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub booking_id: i64,
    pub flow: HandoffFlow,
    pub issuer: Uuid,
}

/// SHA-256 hex digest stored in place of the raw token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_jti() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Issues and verifies single-use collection tokens
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn BookingStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(store: Arc<dyn BookingStore>, signing_secret: &str, ttl_seconds: i64) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub async fn issue(
        &self,
        booking_id: i64,
        flow: HandoffFlow,
        issuer: Uuid,
    ) -> Result<IssuedToken, BookingError> {
        self.issue_at(booking_id, flow, issuer, Utc::now()).await
    }

    /// Issue a token, replacing any live token on the booking
    pub async fn issue_at(
        &self,
        booking_id: i64,
        flow: HandoffFlow,
        issuer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, BookingError> {
        let booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        // The lender displays the QR in both flows
        if booking.lender_id != issuer {
            tracing::warn!(booking_id, issuer = %issuer, flow = %flow, "QR requested by non-lender");
            return Err(BookingError::Unauthorized);
        }

        ensure_handoff_state(&booking, flow)?;

        let exp = (now + self.ttl).timestamp();
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| BookingError::Internal("token expiry out of range".to_string()))?;

        let claims = CollectionClaims {
            booking_id,
            action: COLLECT_ACTION.to_string(),
            flow,
            issuer,
            iat: now.timestamp(),
            exp,
            jti: generate_jti(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| BookingError::Internal(format!("token signing failed: {}", e)))?;

        let change = BookingChange {
            token: Some(TokenFixture::Set {
                hash: hash_token(&token),
                expires_at,
            }),
            ..Default::default()
        };

        self.store
            .apply(booking_id, booking.expectation(), change, now)
            .await?
            .ok_or(BookingError::VersionConflict)?;

        tracing::info!(booking_id, flow = %flow, expires_at = %expires_at, "Collection token issued");

        Ok(IssuedToken {
            booking_id,
            flow,
            token,
            expires_at,
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Authenticate the signature and shape of a raw token.
    ///
    /// The embedded `exp` is not enforced here; expiry is judged against the
    /// booking row in `check`.
    pub fn decode(&self, token: &str) -> Result<CollectionClaims, BookingError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = decode::<CollectionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Collection token rejected");
                BookingError::InvalidToken
            })?
            .claims;

        if claims.action != COLLECT_ACTION {
            return Err(BookingError::InvalidToken);
        }

        Ok(claims)
    }

    /// Expiry and digest checks against the stored fixture, without consuming it
    pub fn check(
        &self,
        booking: &Booking,
        token: &str,
        claims: &CollectionClaims,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if claims.booking_id != booking.booking_id {
            return Err(BookingError::InvalidToken);
        }

        if now.timestamp() > claims.exp {
            return Err(BookingError::TokenExpired);
        }

        let Some(expires_at) = booking.collection_token_expires_at else {
            return Err(BookingError::InvalidToken);
        };
        if now > expires_at {
            return Err(BookingError::TokenExpired);
        }

        match &booking.collection_token_hash {
            Some(stored) if constant_time_eq(stored, &hash_token(token)) => Ok(()),
            _ => Err(BookingError::InvalidToken),
        }
    }

    /// Drop a stale fixture so a fresh token can be issued; never touches a live one
    pub async fn clear_if_expired(&self, booking_id: i64, now: DateTime<Utc>) {
        match self.store.clear_expired_token(booking_id, now).await {
            Ok(true) => tracing::info!(booking_id, "Expired collection token cleared"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(booking_id, error = %e, "Failed to clear expired collection token")
            }
        }
    }

    pub async fn verify(&self, booking_id: i64, token: &str) -> Result<VerifiedToken, BookingError> {
        self.verify_at(booking_id, token, Utc::now()).await
    }

    /// Verify and consume a token on its own, without a state transition
    pub async fn verify_at(
        &self,
        booking_id: i64,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, BookingError> {
        let claims = self.decode(token)?;
        if claims.booking_id != booking_id {
            return Err(BookingError::InvalidToken);
        }

        let booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if let Err(e) = self.check(&booking, token, &claims, now) {
            if e == BookingError::TokenExpired {
                self.clear_if_expired(booking_id, now).await;
            }
            return Err(e);
        }

        let change = BookingChange {
            token: Some(TokenFixture::Clear),
            ..Default::default()
        };

        // Losing this write means another request consumed or replaced the token
        self.store
            .apply(booking_id, booking.expectation(), change, now)
            .await?
            .ok_or(BookingError::InvalidToken)?;

        Ok(VerifiedToken {
            booking_id,
            flow: claims.flow,
            issuer: claims.issuer,
        })
    }
}

/// Status preconditions of a flow, checked on issuance and again on redemption
pub fn ensure_handoff_state(booking: &Booking, flow: HandoffFlow) -> Result<(), BookingError> {
    match flow {
        HandoffFlow::Borrow => {
            if booking.is_collected() {
                return Err(BookingError::AlreadyCollected);
            }
            if booking.status != BookingStatus::Paid {
                return Err(BookingError::InvalidState(
                    "Booking must be paid before pickup".to_string(),
                ));
            }
        }
        HandoffFlow::Return => {
            if booking.status == BookingStatus::Completed {
                return Err(BookingError::AlreadyReturned);
            }
            if !booking.is_collected() {
                return Err(BookingError::NotYetCollected);
            }
            if booking.status != BookingStatus::Active {
                return Err(BookingError::InvalidState(
                    "Booking must be active before return".to_string(),
                ));
            }
        }
    }
    Ok(())
}
