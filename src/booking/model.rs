//! Booking models and data structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Rental agreement between a borrower and a lender
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Booking {
    pub booking_id: i64,
    pub product_id: i64,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: i64,     // minor currency units
    pub security_deposit: i64, // minor currency units
    pub status: BookingStatus,
    #[serde(skip_serializing, default)]
    pub collection_token_hash: Option<String>,
    pub collection_token_expires_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub collected_by: Option<Uuid>,
    pub collection_method: Option<CollectionMethod>,
    pub payment_intent_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub dispute_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.borrower_id == user_id || self.lender_id == user_id
    }

    /// The other participant, if `user_id` is a party at all
    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.borrower_id {
            Some(self.lender_id)
        } else if user_id == self.lender_id {
            Some(self.borrower_id)
        } else {
            None
        }
    }

    pub fn is_collected(&self) -> bool {
        self.collected_at.is_some()
    }

    /// Number of rental days billed for the booking window
    pub fn rental_days(&self) -> i64 {
        rental_days(self.start_date, self.end_date)
    }

    /// Optimistic-concurrency guard matching the current row
    pub fn expectation(&self) -> Expected {
        Expected {
            version: self.version,
            status: self.status,
        }
    }
}

/// Billed days between two dates; a same-day rental counts as one day
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// Upper bound of the default security deposit, in minor units
pub const DEFAULT_DEPOSIT_CAP: i64 = 1000;

/// Deposit held when the request names none: 20% of the total, capped
pub fn default_deposit(total_amount: i64) -> i64 {
    (total_amount / 5).min(DEFAULT_DEPOSIT_CAP)
}

/// Version and status a conditional write must still observe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub version: i64,
    pub status: BookingStatus,
}

/// Booking lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,   // Requested, awaiting lender approval
    Confirmed, // Approved, awaiting payment
    Paid,      // Paid, awaiting pickup
    Active,    // Item with the borrower
    Completed, // Item returned
    Cancelled, // Withdrawn by the borrower
    Rejected,  // Declined by the lender
    Disputed,  // Manual resolution
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Paid => "paid",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Disputed => "disputed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// Statuses that hold the product's calendar
    pub fn blocks_availability(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending
                | BookingStatus::Confirmed
                | BookingStatus::Paid
                | BookingStatus::Active
        )
    }

    /// Transition table of the booking state machine.
    ///
    /// Re-entering the current state is never allowed, so a repeated
    /// request surfaces as an error instead of a second side effect.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (Pending, Confirmed) | (Pending, Cancelled) | (Pending, Rejected) => true,
            (Confirmed, Paid) => true,
            (Paid, Active) => true,
            (Active, Completed) => true,
            (Pending | Confirmed | Paid | Active, Disputed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a handoff was recorded
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "collection_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CollectionMethod {
    Qr,
    Manual,
    Auto,
}

/// Settlement state of the booking's payment
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// A settled payment blocks any further session for the booking
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Refunded)
    }
}

/// Which side of a booking a listing filter selects
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Borrower,
    Lender,
}

/// Row values for a freshly requested booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub product_id: i64,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: i64,
    pub security_deposit: i64,
}

/// Handoff token fixture update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenFixture {
    Set {
        hash: String,
        expires_at: DateTime<Utc>,
    },
    Clear,
}

/// Collection stamp written by a successful scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStamp {
    pub at: DateTime<Utc>,
    pub by: Uuid,
    pub method: CollectionMethod,
}

/// Field updates applied by a single conditional write.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingChange {
    pub status: Option<BookingStatus>,
    pub token: Option<TokenFixture>,
    pub collection: Option<CollectionStamp>,
    pub payment_intent_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub dispute_reason: Option<String>,
}

impl BookingChange {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply the change to an in-memory row, bumping its version
    pub fn apply_to(&self, booking: &mut Booking, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        match &self.token {
            Some(TokenFixture::Set { hash, expires_at }) => {
                booking.collection_token_hash = Some(hash.clone());
                booking.collection_token_expires_at = Some(*expires_at);
            }
            Some(TokenFixture::Clear) => {
                booking.collection_token_hash = None;
                booking.collection_token_expires_at = None;
            }
            None => {}
        }
        if let Some(stamp) = &self.collection {
            booking.collected_at = Some(stamp.at);
            booking.collected_by = Some(stamp.by);
            booking.collection_method = Some(stamp.method);
        }
        if let Some(intent) = &self.payment_intent_id {
            booking.payment_intent_id = Some(intent.clone());
        }
        if let Some(payment_status) = self.payment_status {
            booking.payment_status = payment_status;
        }
        if let Some(reason) = &self.dispute_reason {
            booking.dispute_reason = Some(reason.clone());
        }
        booking.version += 1;
        booking.updated_at = now;
    }
}

/// Request DTO for a rental request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1))]
    pub product_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 0))]
    pub security_deposit: Option<i64>,
}

impl CreateBookingRequest {
    /// Validate request
    pub fn validate_dates(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err("End date must not be before start date".to_string());
        }
        Ok(())
    }
}

/// Request DTO for raising a dispute
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DisputeRequest {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

/// Query parameters for listing bookings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListBookingsQuery {
    pub role: Option<PartyRole>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 8] = [
        Pending, Confirmed, Paid, Active, Completed, Cancelled, Rejected, Disputed,
    ];

    #[test]
    fn test_happy_path_transitions() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Paid));
        assert!(Paid.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
    }

    #[test]
    fn test_no_reentry() {
        for status in ALL {
            assert!(
                !status.can_transition_to(status),
                "{} must not re-enter itself",
                status
            );
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_disputed_reachable_only_from_open_states() {
        assert!(Pending.can_transition_to(Disputed));
        assert!(Active.can_transition_to(Disputed));
        assert!(!Completed.can_transition_to(Disputed));
        for to in ALL {
            assert!(!Disputed.can_transition_to(to));
        }
    }

    #[test]
    fn test_out_of_order_transitions_rejected() {
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Confirmed.can_transition_to(Active));
        assert!(!Paid.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Paid));
    }

    #[test]
    fn test_rental_days() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(rental_days(start, start), 1);
        assert_eq!(
            rental_days(start, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap()),
            3
        );
    }

    #[test]
    fn test_default_deposit_is_a_capped_fifth() {
        assert_eq!(default_deposit(1500), 300);
        assert_eq!(default_deposit(5000), 1000);
        assert_eq!(default_deposit(10_000), DEFAULT_DEPOSIT_CAP);
        assert_eq!(default_deposit(4), 0);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Paid).unwrap(), "\"paid\"");
        let parsed: BookingStatus = serde_json::from_str("\"disputed\"").unwrap();
        assert_eq!(parsed, Disputed);
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let body = r#"{"productId":1,"startDate":"2026-01-01","endDate":"2026-01-02","price":0}"#;
        assert!(serde_json::from_str::<CreateBookingRequest>(body).is_err());
    }

    #[test]
    fn test_create_request_date_order() {
        let request = CreateBookingRequest {
            product_id: 1,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 4).unwrap(),
            security_deposit: None,
        };
        assert!(request.validate_dates().is_err());
    }
}
