//! Settlement DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::fees::FeeSplit;

/// Request DTO for opening a checkout session
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSessionRequest {
    #[validate(range(min = 1))]
    pub product_id: i64,
    #[validate(range(min = 1, max = 365))]
    pub rental_days: Option<i64>,
    #[validate(range(min = 1))]
    pub booking_id: Option<i64>,
}

/// Outcome reported by the checkout return page
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    #[default]
    Paid,
    Failed,
}

/// Request DTO for the settlement callback
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePaymentStatusRequest {
    #[validate(range(min = 1))]
    pub booking_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub session_id: String,
    #[serde(default)]
    pub outcome: PaymentOutcome,
}

/// Checkout session handed back to the payer
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
    pub fee: FeeSplit,
    pub is_dummy: bool,
}

/// Connected payout destination of a lender
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccount {
    pub account_id: String,
    /// Onboarding link for the processor's hosted flow
    pub url: String,
    pub is_dummy: bool,
}

/// Whether a user can currently receive payouts
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PayoutStatus {
    pub connected: bool,
    pub account_id: Option<String>,
}
