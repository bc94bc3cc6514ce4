//! Authentication
//!
//! Verifies the identity provider's session JWTs presented as bearer tokens.

mod jwt;

pub use jwt::{generate_session_token, SessionClaims, SessionError, SessionVerifier};
