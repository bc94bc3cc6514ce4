//! Side effects of booking transitions
//!
//! Transitions publish a `BookingEvent` after their conditional write has
//! committed. A background `SideEffectWorker` turns events into notifications
//! and system chat messages and delivers them best-effort; delivery failures
//! are logged and never reach the request that caused them.

mod dispatcher;
mod events;
mod postgres;

pub use dispatcher::{SideEffectQueue, SideEffectWorker};
pub use events::BookingEvent;
pub use postgres::{PgMessenger, PgNotifier};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Delivery failed: {0}")]
    Failed(String),
}

impl From<sqlx::Error> for DeliveryError {
    fn from(e: sqlx::Error) -> Self {
        DeliveryError::Failed(e.to_string())
    }
}

/// In-app notification for one user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub target_user_id: Uuid,
    pub category: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// System-authored message posted into the conversation between two users
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SystemMessage {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub text: String,
    pub related_product_id: Option<i64>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_system_message(&self, message: &SystemMessage) -> Result<(), DeliveryError>;
}
