//! Booking persistence
//!
//! Every mutation goes through `BookingStore::apply`, a single conditional
//! write matched on the row's `version` and `status`. No in-process locks are
//! held; replicas contend only on the database row.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::model::{
    Booking, BookingChange, BookingStatus, Expected, NewBooking, PartyRole, PaymentStatus,
    TokenFixture,
};
use crate::error::BookingError;

/// Durable record of rental agreements
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a `pending` booking, failing with `Unavailable` on a calendar overlap
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError>;

    async fn get(&self, booking_id: i64) -> Result<Option<Booking>, BookingError>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// Whether any calendar-holding booking of the product intersects `[start, end]`
    async fn has_overlap(
        &self,
        product_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingError>;

    /// Conditionally apply `change`; `Ok(None)` means the expectation no longer holds
    async fn apply(
        &self,
        booking_id: i64,
        expected: Expected,
        change: BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError>;

    /// Clear the token fixture only if its stored expiry has elapsed at `now`
    async fn clear_expired_token(
        &self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError>;
}

/// Postgres-backed booking store
#[derive(Clone)]
pub struct PgBookingStore {
    db_pool: PgPool,
}

impl PgBookingStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        // The exclusion constraint on bookings rejects overlaps that race this insert
        let now = Utc::now();
        let row = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                product_id, borrower_id, lender_id, start_date, end_date,
                total_amount, security_deposit, status, payment_status,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10, $10)
            RETURNING *
            "#,
        )
        .bind(booking.product_id)
        .bind(booking.borrower_id)
        .bind(booking.lender_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.total_amount)
        .bind(booking.security_deposit)
        .bind(BookingStatus::Pending)
        .bind(PaymentStatus::Pending)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(row)
    }

    async fn get(&self, booking_id: i64) -> Result<Option<Booking>, BookingError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(booking)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
    ) -> Result<Vec<Booking>, BookingError> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM bookings WHERE ");

        match role {
            Some(PartyRole::Borrower) => {
                query_builder.push("borrower_id = ");
                query_builder.push_bind(user_id);
            }
            Some(PartyRole::Lender) => {
                query_builder.push("lender_id = ");
                query_builder.push_bind(user_id);
            }
            None => {
                query_builder.push("(borrower_id = ");
                query_builder.push_bind(user_id);
                query_builder.push(" OR lender_id = ");
                query_builder.push_bind(user_id);
                query_builder.push(")");
            }
        }
        query_builder.push(" ORDER BY created_at DESC");

        let bookings = query_builder
            .build_query_as::<Booking>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(bookings)
    }

    async fn has_overlap(
        &self,
        product_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingError> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE product_id = $1
                  AND status IN ('pending', 'confirmed', 'paid', 'active')
                  AND end_date >= $2
                  AND start_date <= $3
            )
            "#,
        )
        .bind(product_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }

    async fn apply(
        &self,
        booking_id: i64,
        expected: Expected,
        change: BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE bookings SET version = version + 1, updated_at = ");
        query_builder.push_bind(now);

        if let Some(status) = change.status {
            query_builder.push(", status = ");
            query_builder.push_bind(status);
        }
        match change.token {
            Some(TokenFixture::Set { hash, expires_at }) => {
                query_builder.push(", collection_token_hash = ");
                query_builder.push_bind(hash);
                query_builder.push(", collection_token_expires_at = ");
                query_builder.push_bind(expires_at);
            }
            Some(TokenFixture::Clear) => {
                query_builder.push(
                    ", collection_token_hash = NULL, collection_token_expires_at = NULL",
                );
            }
            None => {}
        }
        if let Some(stamp) = change.collection {
            query_builder.push(", collected_at = ");
            query_builder.push_bind(stamp.at);
            query_builder.push(", collected_by = ");
            query_builder.push_bind(stamp.by);
            query_builder.push(", collection_method = ");
            query_builder.push_bind(stamp.method);
        }
        if let Some(intent) = change.payment_intent_id {
            query_builder.push(", payment_intent_id = ");
            query_builder.push_bind(intent);
        }
        if let Some(payment_status) = change.payment_status {
            query_builder.push(", payment_status = ");
            query_builder.push_bind(payment_status);
        }
        if let Some(reason) = change.dispute_reason {
            query_builder.push(", dispute_reason = ");
            query_builder.push_bind(reason);
        }

        query_builder.push(" WHERE booking_id = ");
        query_builder.push_bind(booking_id);
        query_builder.push(" AND version = ");
        query_builder.push_bind(expected.version);
        query_builder.push(" AND status = ");
        query_builder.push_bind(expected.status);
        query_builder.push(" RETURNING *");

        let updated = query_builder
            .build_query_as::<Booking>()
            .fetch_optional(&self.db_pool)
            .await?;

        if updated.is_none() {
            tracing::debug!(
                booking_id,
                expected_version = expected.version,
                expected_status = %expected.status,
                "Conditional booking write lost"
            );
        }

        Ok(updated)
    }

    async fn clear_expired_token(
        &self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET collection_token_hash = NULL,
                collection_token_expires_at = NULL,
                version = version + 1,
                updated_at = $2
            WHERE booking_id = $1
              AND collection_token_expires_at IS NOT NULL
              AND collection_token_expires_at < $2
            "#,
        )
        .bind(booking_id)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
