//! In-memory booking store
//!
//! Emulates the conditional-write semantics of `PgBookingStore` for tests and
//! local tooling. Each operation takes the map lock once and never holds it
//! across an await point.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::model::{
    Booking, BookingChange, BookingStatus, Expected, NewBooking, PartyRole, PaymentStatus,
};
use super::store::BookingStore;
use crate::error::BookingError;

pub struct InMemoryBookingStore {
    rows: Mutex<HashMap<i64, Booking>>,
    next_id: AtomicI64,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed a row as-is, replacing any existing booking with the same id
    pub fn put(&self, booking: Booking) {
        self.next_id
            .fetch_max(booking.booking_id + 1, Ordering::SeqCst);
        self.lock().insert(booking.booking_id, booking);
    }

    /// Current copy of a row
    pub fn snapshot(&self, booking_id: i64) -> Option<Booking> {
        self.lock().get(&booking_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Booking>> {
        // A poisoned map only means a test thread panicked mid-write
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

fn overlaps(row: &Booking, product_id: i64, start: NaiveDate, end: NaiveDate) -> bool {
    row.product_id == product_id
        && row.status.blocks_availability()
        && row.end_date >= start
        && row.start_date <= end
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let mut rows = self.lock();

        if rows
            .values()
            .any(|row| overlaps(row, booking.product_id, booking.start_date, booking.end_date))
        {
            return Err(BookingError::Unavailable);
        }

        let now = Utc::now();
        let row = Booking {
            booking_id: self.next_id.fetch_add(1, Ordering::SeqCst),
            product_id: booking.product_id,
            borrower_id: booking.borrower_id,
            lender_id: booking.lender_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
            total_amount: booking.total_amount,
            security_deposit: booking.security_deposit,
            status: BookingStatus::Pending,
            collection_token_hash: None,
            collection_token_expires_at: None,
            collected_at: None,
            collected_by: None,
            collection_method: None,
            payment_intent_id: None,
            payment_status: PaymentStatus::Pending,
            dispute_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.booking_id, row.clone());

        Ok(row)
    }

    async fn get(&self, booking_id: i64) -> Result<Option<Booking>, BookingError> {
        Ok(self.snapshot(booking_id))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
    ) -> Result<Vec<Booking>, BookingError> {
        let mut bookings: Vec<Booking> = self
            .lock()
            .values()
            .filter(|row| match role {
                Some(PartyRole::Borrower) => row.borrower_id == user_id,
                Some(PartyRole::Lender) => row.lender_id == user_id,
                None => row.is_party(user_id),
            })
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(bookings)
    }

    async fn has_overlap(
        &self,
        product_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingError> {
        Ok(self
            .lock()
            .values()
            .any(|row| overlaps(row, product_id, start, end)))
    }

    async fn apply(
        &self,
        booking_id: i64,
        expected: Expected,
        change: BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let mut rows = self.lock();
        let Some(row) = rows.get_mut(&booking_id) else {
            return Ok(None);
        };

        if row.version != expected.version || row.status != expected.status {
            return Ok(None);
        }

        change.apply_to(row, now);
        Ok(Some(row.clone()))
    }

    async fn clear_expired_token(
        &self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let mut rows = self.lock();
        let Some(row) = rows.get_mut(&booking_id) else {
            return Ok(false);
        };

        match row.collection_token_expires_at {
            Some(expires_at) if expires_at < now => {
                row.collection_token_hash = None;
                row.collection_token_expires_at = None;
                row.version += 1;
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
