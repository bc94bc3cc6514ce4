//! Handoff flows and DTOs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::booking::{Booking, BookingStatus};
use crate::error::BookingError;

/// Direction of a physical handoff
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HandoffFlow {
    Borrow, // initial pickup
    Return, // item given back
}

impl HandoffFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffFlow::Borrow => "borrow",
            HandoffFlow::Return => "return",
        }
    }

    /// Status a successful scan moves the booking into
    pub fn target_status(&self) -> BookingStatus {
        match self {
            HandoffFlow::Borrow => BookingStatus::Active,
            HandoffFlow::Return => BookingStatus::Completed,
        }
    }

    /// Error reported to the loser of a concurrent scan
    pub fn lost_race_error(&self) -> BookingError {
        match self {
            HandoffFlow::Borrow => BookingError::AlreadyCollected,
            HandoffFlow::Return => BookingError::AlreadyReturned,
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            HandoffFlow::Borrow => "Item collection confirmed successfully",
            HandoffFlow::Return => "Item return confirmed successfully",
        }
    }
}

impl fmt::Display for HandoffFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters for generating a handoff QR
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QrQuery {
    pub flow: Option<HandoffFlow>,
}

/// Request DTO for a scanned QR
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectRequest {
    pub token: String,
}

/// Result of a committed handoff
#[derive(Debug, Clone, Serialize)]
pub struct HandoffOutcome {
    pub booking: Booking,
    pub flow: HandoffFlow,
    pub message: String,
}

/// Response DTO for a scanned QR
#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub ok: bool,
    pub booking: Booking,
    pub message: String,
}

impl From<HandoffOutcome> for CollectResponse {
    fn from(outcome: HandoffOutcome) -> Self {
        Self {
            ok: true,
            booking: outcome.booking,
            message: outcome.message,
        }
    }
}
