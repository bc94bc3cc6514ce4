//! Redeems scanned QR tokens into booking transitions

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{HandoffFlow, HandoffOutcome};
use super::token::{ensure_handoff_state, TokenService};
use crate::booking::{BookingChange, BookingStore, CollectionMethod, CollectionStamp, TokenFixture};
use crate::error::BookingError;
use crate::notify::{BookingEvent, SideEffectQueue};

/// Orchestrates token verification, authorization and the atomic handoff write
#[derive(Clone)]
pub struct HandoffCoordinator {
    store: Arc<dyn BookingStore>,
    tokens: Arc<TokenService>,
    side_effects: SideEffectQueue,
}

impl HandoffCoordinator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        tokens: Arc<TokenService>,
        side_effects: SideEffectQueue,
    ) -> Self {
        Self {
            store,
            tokens,
            side_effects,
        }
    }

    pub async fn redeem(&self, token: &str, scanner: Uuid) -> Result<HandoffOutcome, BookingError> {
        self.redeem_at(token, scanner, Utc::now()).await
    }

    /// Redeem a scanned token on behalf of `scanner`.
    ///
    /// Token consumption, the status change and the collection stamp commit
    /// in one conditional write. Of several concurrent scans of the same token
    /// exactly one commits; the others observe the guard error of their flow.
    pub async fn redeem_at(
        &self,
        token: &str,
        scanner: Uuid,
        now: DateTime<Utc>,
    ) -> Result<HandoffOutcome, BookingError> {
        let claims = self.tokens.decode(token)?;
        let flow = claims.flow;
        let booking_id = claims.booking_id;

        let booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if let Err(e) = self.tokens.check(&booking, token, &claims, now) {
            if e == BookingError::TokenExpired {
                self.tokens.clear_if_expired(booking_id, now).await;
            }
            return Err(e);
        }

        if scanner != booking.borrower_id || scanner == claims.issuer {
            tracing::warn!(
                booking_id,
                scanner = %scanner,
                issuer = %claims.issuer,
                flow = %flow,
                "QR scanned by a user other than the borrower"
            );
            return Err(BookingError::Unauthorized);
        }

        ensure_handoff_state(&booking, flow)?;

        let target = flow.target_status();
        if !booking.status.can_transition_to(target) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: target,
            });
        }

        let change = BookingChange {
            status: Some(target),
            token: Some(TokenFixture::Clear),
            // Each scan stamps who handed the item over and when
            collection: Some(CollectionStamp {
                at: now,
                by: scanner,
                method: CollectionMethod::Qr,
            }),
            ..Default::default()
        };

        let updated = self
            .store
            .apply(booking_id, booking.expectation(), change, now)
            .await?
            .ok_or_else(|| {
                tracing::info!(booking_id, flow = %flow, "Concurrent handoff lost the race");
                flow.lost_race_error()
            })?;

        tracing::info!(
            booking_id,
            flow = %flow,
            scanner = %scanner,
            status = %updated.status,
            "Handoff confirmed"
        );

        let event = match flow {
            HandoffFlow::Borrow => BookingEvent::Collected {
                booking: updated.clone(),
                scanner,
            },
            HandoffFlow::Return => BookingEvent::Returned {
                booking: updated.clone(),
                scanner,
            },
        };
        self.side_effects.publish(event);

        Ok(HandoffOutcome {
            booking: updated,
            flow,
            message: flow.success_message().to_string(),
        })
    }
}
