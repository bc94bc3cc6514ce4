//! Booking lifecycle service
//!
//! Request, approval, rejection, cancellation and disputes. Payment and
//! handoff transitions live in the settlement and handoff modules, but every
//! transition consults the same `BookingStatus::can_transition_to` table and
//! commits through a conditional store write.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::model::{
    default_deposit, rental_days, Booking, BookingChange, BookingStatus, CreateBookingRequest,
    DisputeRequest, NewBooking, PartyRole,
};
use super::store::BookingStore;
use crate::catalog::Catalog;
use crate::error::BookingError;
use crate::notify::{BookingEvent, SideEffectQueue};

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn Catalog>,
    side_effects: SideEffectQueue,
}

/// Which party may trigger a transition
#[derive(Debug, Clone, Copy)]
enum Actor {
    Borrower,
    Lender,
    Either,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn Catalog>,
        side_effects: SideEffectQueue,
    ) -> Self {
        Self {
            store,
            catalog,
            side_effects,
        }
    }

    /// Create a pending rental request and notify the lender
    pub async fn request_booking(
        &self,
        borrower: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        request.validate()?;
        request.validate_dates().map_err(BookingError::Validation)?;

        let product = self
            .catalog
            .product(request.product_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if product.lender_id == borrower {
            return Err(BookingError::Validation(
                "You cannot book your own listing".to_string(),
            ));
        }

        if self
            .store
            .has_overlap(product.product_id, request.start_date, request.end_date)
            .await?
        {
            return Err(BookingError::Unavailable);
        }

        let days = rental_days(request.start_date, request.end_date);
        let total_amount = product.price_per_day.checked_mul(days).ok_or_else(|| {
            BookingError::Validation("Rental total is out of range".to_string())
        })?;

        // The store re-checks the calendar atomically with the insert
        let booking = self
            .store
            .insert(NewBooking {
                product_id: product.product_id,
                borrower_id: borrower,
                lender_id: product.lender_id,
                start_date: request.start_date,
                end_date: request.end_date,
                total_amount,
                security_deposit: request
                    .security_deposit
                    .unwrap_or_else(|| default_deposit(total_amount)),
            })
            .await?;

        tracing::info!(
            booking_id = booking.booking_id,
            product_id = booking.product_id,
            borrower = %borrower,
            days,
            "Booking requested"
        );

        self.side_effects.publish(BookingEvent::Requested {
            booking: booking.clone(),
        });

        Ok(booking)
    }

    pub async fn approve(&self, lender: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        let booking = self
            .transition(
                lender,
                booking_id,
                Actor::Lender,
                BookingChange::status(BookingStatus::Confirmed),
            )
            .await?;
        self.side_effects.publish(BookingEvent::Approved {
            booking: booking.clone(),
        });
        Ok(booking)
    }

    pub async fn reject(&self, lender: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        let booking = self
            .transition(
                lender,
                booking_id,
                Actor::Lender,
                BookingChange::status(BookingStatus::Rejected),
            )
            .await?;
        self.side_effects.publish(BookingEvent::Rejected {
            booking: booking.clone(),
        });
        Ok(booking)
    }

    pub async fn cancel(&self, borrower: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        let booking = self
            .transition(
                borrower,
                booking_id,
                Actor::Borrower,
                BookingChange::status(BookingStatus::Cancelled),
            )
            .await?;
        self.side_effects.publish(BookingEvent::Cancelled {
            booking: booking.clone(),
        });
        Ok(booking)
    }

    /// Freeze the booking for manual resolution
    pub async fn dispute(
        &self,
        party: Uuid,
        booking_id: i64,
        request: DisputeRequest,
    ) -> Result<Booking, BookingError> {
        request.validate()?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(BookingError::Validation(
                "Dispute reason must not be blank".to_string(),
            ));
        }

        let change = BookingChange {
            status: Some(BookingStatus::Disputed),
            dispute_reason: Some(reason.to_string()),
            ..Default::default()
        };
        let booking = self
            .transition(party, booking_id, Actor::Either, change)
            .await?;

        tracing::warn!(booking_id, raised_by = %party, "Booking disputed");
        self.side_effects.publish(BookingEvent::Disputed {
            booking: booking.clone(),
            raised_by: party,
        });
        Ok(booking)
    }

    /// Party-only read; other users see `NotFound`
    pub async fn get(&self, actor: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        match self.store.get(booking_id).await? {
            Some(booking) if booking.is_party(actor) => Ok(booking),
            _ => Err(BookingError::NotFound),
        }
    }

    pub async fn list_for_user(
        &self,
        actor: Uuid,
        role: Option<PartyRole>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.store.list_for_user(actor, role).await
    }

    async fn transition(
        &self,
        actor: Uuid,
        booking_id: i64,
        allowed: Actor,
        change: BookingChange,
    ) -> Result<Booking, BookingError> {
        let booking = self.get(actor, booking_id).await?;

        let permitted = match allowed {
            Actor::Borrower => booking.borrower_id == actor,
            Actor::Lender => booking.lender_id == actor,
            Actor::Either => true,
        };
        if !permitted {
            tracing::warn!(booking_id, actor = %actor, "Transition attempted by the wrong party");
            return Err(BookingError::Unauthorized);
        }

        if let Some(next) = change.status {
            if !booking.status.can_transition_to(next) {
                return Err(BookingError::InvalidTransition {
                    from: booking.status,
                    to: next,
                });
            }
        }

        let updated = self
            .store
            .apply(booking_id, booking.expectation(), change, Utc::now())
            .await?
            .ok_or(BookingError::VersionConflict)?;

        tracing::info!(
            booking_id,
            from = %booking.status,
            to = %updated.status,
            "Booking transitioned"
        );

        Ok(updated)
    }
}
