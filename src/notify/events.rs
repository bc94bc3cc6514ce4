//! Booking events and how they render into deliveries

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::{Notification, SystemMessage};
use crate::booking::Booking;

/// Committed booking transition
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BookingEvent {
    Requested { booking: Booking },
    Approved { booking: Booking },
    Rejected { booking: Booking },
    Cancelled { booking: Booking },
    Disputed { booking: Booking, raised_by: Uuid },
    Paid { booking: Booking },
    Collected { booking: Booking, scanner: Uuid },
    Returned { booking: Booking, scanner: Uuid },
}

impl BookingEvent {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingEvent::Requested { booking }
            | BookingEvent::Approved { booking }
            | BookingEvent::Rejected { booking }
            | BookingEvent::Cancelled { booking }
            | BookingEvent::Disputed { booking, .. }
            | BookingEvent::Paid { booking }
            | BookingEvent::Collected { booking, .. }
            | BookingEvent::Returned { booking, .. } => booking,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookingEvent::Requested { .. } => "requested",
            BookingEvent::Approved { .. } => "approved",
            BookingEvent::Rejected { .. } => "rejected",
            BookingEvent::Cancelled { .. } => "cancelled",
            BookingEvent::Disputed { .. } => "disputed",
            BookingEvent::Paid { .. } => "paid",
            BookingEvent::Collected { .. } => "collected",
            BookingEvent::Returned { .. } => "returned",
        }
    }

    /// Whether rendering needs the borrower's display name
    pub fn mentions_borrower(&self) -> bool {
        matches!(
            self,
            BookingEvent::Collected { .. } | BookingEvent::Returned { .. }
        )
    }

    /// Notification for the counterparty of the transition
    pub fn notification(&self, borrower_name: &str) -> Notification {
        let booking = self.booking();
        let base = json!({
            "booking_id": booking.booking_id,
            "product_id": booking.product_id,
        });

        let (target, category, title, message, metadata) = match self {
            BookingEvent::Requested { .. } => (
                booking.lender_id,
                "booking_request",
                "New Rental Request",
                format!(
                    "Someone wants to rent your item for {} days",
                    booking.rental_days()
                ),
                with(base, json!({ "borrower_id": booking.borrower_id })),
            ),
            BookingEvent::Approved { .. } => (
                booking.borrower_id,
                "booking_approved",
                "Booking Approved",
                "Your rental request was approved. Complete payment to secure it.".to_string(),
                base,
            ),
            BookingEvent::Rejected { .. } => (
                booking.borrower_id,
                "booking_rejected",
                "Booking Declined",
                "Your rental request was declined by the lender.".to_string(),
                base,
            ),
            BookingEvent::Cancelled { .. } => (
                booking.lender_id,
                "booking_cancelled",
                "Booking Cancelled",
                "A rental request for your item was cancelled.".to_string(),
                base,
            ),
            BookingEvent::Disputed { raised_by, .. } => (
                booking
                    .counterparty_of(*raised_by)
                    .unwrap_or(booking.lender_id),
                "booking_disputed",
                "Booking Disputed",
                "A dispute was raised on one of your bookings.".to_string(),
                with(base, json!({ "raised_by": raised_by })),
            ),
            BookingEvent::Paid { .. } => (
                booking.lender_id,
                "payment_received",
                "Payment Received",
                "The borrower has paid for the rental.".to_string(),
                with(
                    base,
                    json!({ "payment_intent_id": booking.payment_intent_id }),
                ),
            ),
            BookingEvent::Collected { scanner, .. } => (
                booking.lender_id,
                "booking_confirmed",
                "Item Collected",
                format!("{} has collected the item via QR scan", borrower_name),
                with(
                    base,
                    json!({ "collected_by": scanner, "collection_method": "qr" }),
                ),
            ),
            BookingEvent::Returned { scanner, .. } => (
                booking.lender_id,
                "booking_confirmed",
                "Item Returned",
                format!("{} has returned the item via QR scan", borrower_name),
                with(
                    base,
                    json!({ "collected_by": scanner, "collection_method": "qr" }),
                ),
            ),
        };

        Notification {
            target_user_id: target,
            category: category.to_string(),
            title: title.to_string(),
            message,
            metadata,
        }
    }

    /// Chat message for handoff events, sent from the scanner to the other party
    pub fn system_message(&self, notification: &Notification) -> Option<SystemMessage> {
        let (booking, scanner) = match self {
            BookingEvent::Collected { booking, scanner }
            | BookingEvent::Returned { booking, scanner } => (booking, *scanner),
            _ => return None,
        };

        let to_user_id = booking.counterparty_of(scanner)?;
        Some(SystemMessage {
            from_user_id: scanner,
            to_user_id,
            text: format!("System: {}", notification.message),
            related_product_id: Some(booking.product_id),
        })
    }
}

fn with(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}
