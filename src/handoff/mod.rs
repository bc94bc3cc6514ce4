//! QR handoff protocol
//!
//! The lender displays a short-lived signed token as a QR code; the borrower
//! scans it and the coordinator advances the booking `paid -> active` on
//! pickup or `active -> completed` on return.

pub mod coordinator;
pub mod model;
pub mod token;

pub use coordinator::HandoffCoordinator;
pub use model::{CollectRequest, CollectResponse, HandoffFlow, HandoffOutcome, QrQuery};
pub use token::{hash_token, CollectionClaims, IssuedToken, TokenService, VerifiedToken};
