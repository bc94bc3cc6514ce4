//! Error types for the rental handoff service
//!
//! `BookingError` is the domain error returned by every store, service and
//! coordinator operation. `ApiError` is the HTTP boundary error; it wraps
//! domain errors and maps each kind onto a status code and a stable JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::booking::BookingStatus;

/// Domain failures of the booking lifecycle, handoff and settlement paths
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("QR code has expired. Please generate a new one.")]
    TokenExpired,

    #[error("Not authorized to perform this action on the booking")]
    Unauthorized,

    #[error("Booking already collected")]
    AlreadyCollected,

    #[error("Booking must be collected before return")]
    NotYetCollected,

    #[error("Booking already returned")]
    AlreadyReturned,

    #[error("Booking not found")]
    NotFound,

    #[error("This seller hasn't connected a payout account yet")]
    SellerNotOnboarded,

    #[error("Booking has already been paid")]
    AlreadyPaid,

    #[error("Invalid booking state: {0}")]
    InvalidState(String),

    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Product is not available for the selected dates")]
    Unavailable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Booking was modified concurrently, retry the request")]
    VersionConflict,

    #[error("Payment processor error: {0}")]
    Processor(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            BookingError::InvalidToken => "INVALID_TOKEN",
            BookingError::TokenExpired => "TOKEN_EXPIRED",
            BookingError::Unauthorized => "UNAUTHORIZED",
            BookingError::AlreadyCollected => "ALREADY_COLLECTED",
            BookingError::NotYetCollected => "NOT_YET_COLLECTED",
            BookingError::AlreadyReturned => "ALREADY_RETURNED",
            BookingError::NotFound => "NOT_FOUND",
            BookingError::SellerNotOnboarded => "SELLER_NOT_ONBOARDED",
            BookingError::AlreadyPaid => "ALREADY_PAID",
            BookingError::InvalidState(_) => "INVALID_STATE",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::Unavailable => "UNAVAILABLE",
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::VersionConflict => "VERSION_CONFLICT",
            BookingError::Processor(_) => "PAYMENT_PROCESSOR_ERROR",
            BookingError::Storage(_) | BookingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidToken
            | BookingError::TokenExpired
            | BookingError::SellerNotOnboarded
            | BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Unauthorized => StatusCode::FORBIDDEN,
            BookingError::NotFound => StatusCode::NOT_FOUND,
            BookingError::AlreadyCollected
            | BookingError::NotYetCollected
            | BookingError::AlreadyReturned
            | BookingError::AlreadyPaid
            | BookingError::InvalidState(_)
            | BookingError::InvalidTransition { .. }
            | BookingError::Unavailable
            | BookingError::VersionConflict => StatusCode::CONFLICT,
            BookingError::Processor(_) => StatusCode::BAD_GATEWAY,
            BookingError::Storage(_) | BookingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the same request may succeed if simply retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::VersionConflict | BookingError::Storage(_) | BookingError::Processor(_)
        )
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // exclusion_violation raised by the booking overlap constraint
            if db_err.code().as_deref() == Some("23P01") {
                return BookingError::Unavailable;
            }
        }
        BookingError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for BookingError {
    fn from(err: reqwest::Error) -> Self {
        BookingError::Processor(err.to_string())
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(err: validator::ValidationErrors) -> Self {
        BookingError::Validation(err.to_string())
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
    pub status_code: u16,
    #[serde(rename = "needsConnect", skip_serializing_if = "std::ops::Not::not")]
    pub needs_connect: bool,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Booking(e) => e.error_code(),
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Booking(e) => e.status_code(),
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client; infrastructure details stay in the logs
    fn public_message(&self) -> String {
        match self {
            ApiError::Booking(BookingError::Storage(_))
            | ApiError::Booking(BookingError::Internal(_))
            | ApiError::InternalError(_) => "Internal server error".to_string(),
            ApiError::Booking(BookingError::Processor(_)) => {
                "Payment processor is unavailable, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        match &self {
            ApiError::InternalError(_)
            | ApiError::Booking(BookingError::Storage(_))
            | ApiError::Booking(BookingError::Internal(_))
            | ApiError::Booking(BookingError::Processor(_)) => {
                tracing::error!(error = %self, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %self, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.public_message(),
            },
            status_code: status.as_u16(),
            needs_connect: matches!(self, ApiError::Booking(BookingError::SellerNotOnboarded)),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
