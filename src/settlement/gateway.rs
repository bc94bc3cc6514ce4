//! Settlement gateway: checkout sessions, payment confirmation and payout onboarding

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::fees::FeeSplit;
use super::model::{CheckoutSession, CreateSessionRequest, PayoutAccount, PayoutStatus};
use super::processor::{CheckoutRequest, PaymentProcessor};
use crate::booking::{Booking, BookingChange, BookingStatus, BookingStore, PaymentStatus};
use crate::catalog::Catalog;
use crate::error::BookingError;
use crate::notify::{BookingEvent, SideEffectQueue};

/// Gateway settings resolved from configuration
#[derive(Debug, Clone)]
pub struct SettlementSettings {
    pub fee_bps: u32,
    pub currency: String,
    pub public_origin: String,
}

#[derive(Clone)]
pub struct SettlementGateway {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn Catalog>,
    processor: Arc<dyn PaymentProcessor>,
    side_effects: SideEffectQueue,
    settings: SettlementSettings,
}

impl SettlementGateway {
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn Catalog>,
        processor: Arc<dyn PaymentProcessor>,
        side_effects: SideEffectQueue,
        settings: SettlementSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            processor,
            side_effects,
            settings,
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.processor.is_sandbox()
    }

    /// Open a checkout session for a confirmed booking or an ad-hoc rental
    pub async fn create_session(
        &self,
        payer: Uuid,
        payer_email: Option<&str>,
        request: CreateSessionRequest,
    ) -> Result<CheckoutSession, BookingError> {
        request.validate()?;

        let product = self
            .catalog
            .product(request.product_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let booking = match request.booking_id {
            Some(booking_id) => {
                let booking = self.payable_booking(payer, booking_id).await?;
                if booking.product_id != product.product_id {
                    return Err(BookingError::Validation(
                        "productId does not match the booking".to_string(),
                    ));
                }
                self.retire_open_session(&booking).await?;
                Some(booking)
            }
            None => None,
        };

        let lender_id = booking
            .as_ref()
            .map(|b| b.lender_id)
            .unwrap_or(product.lender_id);
        if lender_id == payer {
            return Err(BookingError::Validation(
                "You cannot pay for your own listing".to_string(),
            ));
        }

        let (gross, rental_days, description) = match &booking {
            Some(b) => (
                b.total_amount,
                b.rental_days(),
                format!("Rental booking from {} to {}", b.start_date, b.end_date),
            ),
            None => {
                let days = request.rental_days.unwrap_or(1);
                let gross = product.price_per_day.checked_mul(days).ok_or_else(|| {
                    BookingError::Validation("Invalid price or rental duration".to_string())
                })?;
                (
                    gross,
                    days,
                    format!("{} day(s) rental of {}", days, product.name),
                )
            }
        };

        let destination = self
            .catalog
            .payout_account(lender_id)
            .await?
            .ok_or_else(|| {
                tracing::info!(lender_id = %lender_id, product_id = product.product_id, "Lender has no payout account");
                BookingError::SellerNotOnboarded
            })?;

        let fee = FeeSplit::compute(gross, self.settings.fee_bps)?;

        let origin = self.settings.public_origin.trim_end_matches('/');
        let booking_param = request
            .booking_id
            .map(|id| format!("&booking_id={}", id))
            .unwrap_or_default();

        let checkout = CheckoutRequest {
            booking_id: request.booking_id,
            product_name: match booking {
                Some(_) => format!("{} - Rental Booking", product.name),
                None => format!("{} - Rental", product.name),
            },
            description,
            currency: self.settings.currency.clone(),
            gross: fee.gross,
            application_fee: fee.platform_fee,
            destination,
            customer_email: payer_email.map(str::to_string),
            success_url: format!(
                "{}/payments/success?session_id={{CHECKOUT_SESSION_ID}}{}",
                origin, booking_param
            ),
            cancel_url: format!(
                "{}/products/{}?payment_cancelled=1",
                origin, product.product_id
            ),
            metadata: vec![
                ("product_id".to_string(), product.product_id.to_string()),
                ("lender_id".to_string(), lender_id.to_string()),
                ("borrower_id".to_string(), payer.to_string()),
                ("rental_days".to_string(), rental_days.to_string()),
                (
                    "booking_id".to_string(),
                    request
                        .booking_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                ),
            ],
        };

        let session = self.processor.create_checkout(&checkout).await?;

        if let Some(booking) = booking {
            let change = BookingChange {
                payment_intent_id: Some(session.id.clone()),
                payment_status: Some(PaymentStatus::Pending),
                ..Default::default()
            };
            self.store
                .apply(booking.booking_id, booking.expectation(), change, Utc::now())
                .await?
                .ok_or(BookingError::VersionConflict)?;
        }

        tracing::info!(
            session_id = %session.id,
            booking_id = ?request.booking_id,
            gross = fee.gross,
            platform_fee = fee.platform_fee,
            "Checkout session opened"
        );

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
            fee,
            is_dummy: self.processor.is_sandbox(),
        })
    }

    pub async fn confirm_payment(
        &self,
        payer: Uuid,
        booking_id: i64,
        session_id: &str,
    ) -> Result<Booking, BookingError> {
        self.confirm_payment_at(payer, booking_id, session_id, Utc::now())
            .await
    }

    /// Settlement callback: move a confirmed booking to `paid`.
    ///
    /// Exactly one confirmation can succeed per booking; later calls see
    /// `AlreadyPaid`.
    pub async fn confirm_payment_at(
        &self,
        payer: Uuid,
        booking_id: i64,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let booking = self.owned_booking(payer, booking_id).await?;

        if booking.payment_status.is_settled() {
            return Err(BookingError::AlreadyPaid);
        }
        if booking.payment_intent_id.as_deref() != Some(session_id) {
            tracing::warn!(booking_id, session_id, "Payment confirmation for unknown session");
            return Err(BookingError::Validation(
                "Session does not belong to this booking".to_string(),
            ));
        }
        if !self.processor.is_session_paid(session_id).await? {
            return Err(BookingError::InvalidState(
                "Payment has not been completed".to_string(),
            ));
        }

        self.settle(&booking, session_id, now).await
    }

    /// Conditional write `confirmed -> paid` for a session the processor reports as paid
    async fn settle(
        &self,
        booking: &Booking,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let booking_id = booking.booking_id;
        if !booking.status.can_transition_to(BookingStatus::Paid) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Paid,
            });
        }

        let change = BookingChange {
            status: Some(BookingStatus::Paid),
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        };

        let Some(updated) = self
            .store
            .apply(booking_id, booking.expectation(), change, now)
            .await?
        else {
            // Someone else wrote first; report what they did
            return match self.store.get(booking_id).await? {
                Some(current) if current.payment_status.is_settled() => {
                    Err(BookingError::AlreadyPaid)
                }
                _ => Err(BookingError::VersionConflict),
            };
        };

        tracing::info!(booking_id, session_id, "Booking paid");
        self.side_effects.publish(BookingEvent::Paid {
            booking: updated.clone(),
        });

        Ok(updated)
    }

    /// Mark the recorded session as failed so the borrower may retry checkout
    pub async fn record_payment_failure(
        &self,
        payer: Uuid,
        booking_id: i64,
        session_id: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.owned_booking(payer, booking_id).await?;

        if booking.payment_status.is_settled() {
            return Err(BookingError::AlreadyPaid);
        }
        if booking.payment_intent_id.as_deref() != Some(session_id) {
            return Err(BookingError::Validation(
                "Session does not belong to this booking".to_string(),
            ));
        }

        let change = BookingChange {
            payment_status: Some(PaymentStatus::Failed),
            ..Default::default()
        };
        let updated = self
            .store
            .apply(booking_id, booking.expectation(), change, Utc::now())
            .await?
            .ok_or(BookingError::VersionConflict)?;

        tracing::info!(booking_id, session_id, "Payment marked as failed");
        Ok(updated)
    }

    /// Return the user's payout account, creating one on first use
    pub async fn connect_payout_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<PayoutAccount, BookingError> {
        let profile = self
            .catalog
            .user(user_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let account_id = match profile.payout_account_id {
            Some(existing) => existing,
            None => {
                let email = email.or(profile.email.as_deref());
                let created = self.processor.create_payout_account(user_id, email).await?;
                self.catalog.set_payout_account(user_id, &created).await?;
                tracing::info!(user_id = %user_id, account_id = %created, "Payout account connected");
                created
            }
        };

        let origin = self.settings.public_origin.trim_end_matches('/');
        let url = self
            .processor
            .onboarding_link(
                &account_id,
                &format!("{}/profile?stripe_refresh=1", origin),
                &format!("{}/profile?stripe_connected=1", origin),
            )
            .await?;

        Ok(PayoutAccount {
            account_id,
            url,
            is_dummy: self.processor.is_sandbox(),
        })
    }

    pub async fn payout_status(&self, user_id: Uuid) -> Result<PayoutStatus, BookingError> {
        let account_id = self.catalog.payout_account(user_id).await?;
        Ok(PayoutStatus {
            connected: account_id.is_some(),
            account_id,
        })
    }

    /// Booking of `payer` that may still be paid for
    async fn payable_booking(&self, payer: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        let booking = self.owned_booking(payer, booking_id).await?;

        if booking.payment_status.is_settled() {
            return Err(BookingError::AlreadyPaid);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidState(format!(
                "Booking is {}, only confirmed bookings can be paid",
                booking.status
            )));
        }

        Ok(booking)
    }

    /// Settle or close the session left open by an earlier checkout attempt.
    ///
    /// A booking records one session at a time; the superseded one must not
    /// stay payable.
    async fn retire_open_session(&self, booking: &Booking) -> Result<(), BookingError> {
        let Some(open) = booking.payment_intent_id.as_deref() else {
            return Ok(());
        };
        if booking.payment_status != PaymentStatus::Pending {
            return Ok(());
        }

        if self.processor.is_session_paid(open).await? {
            tracing::warn!(
                booking_id = booking.booking_id,
                session_id = open,
                "Earlier checkout session was paid, settling it"
            );
            self.settle(booking, open, Utc::now()).await?;
            return Err(BookingError::AlreadyPaid);
        }

        self.processor.expire_session(open).await?;
        tracing::info!(
            booking_id = booking.booking_id,
            session_id = open,
            "Superseded checkout session expired"
        );
        Ok(())
    }

    /// Bookings of other users read as missing
    async fn owned_booking(&self, payer: Uuid, booking_id: i64) -> Result<Booking, BookingError> {
        match self.store.get(booking_id).await? {
            Some(booking) if booking.borrower_id == payer => Ok(booking),
            _ => Err(BookingError::NotFound),
        }
    }
}
