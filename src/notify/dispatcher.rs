//! Post-commit side-effect queue and its delivery worker

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{BookingEvent, DeliveryError, Messenger, Notification, Notifier, SystemMessage};
use crate::catalog::Catalog;

const FALLBACK_BORROWER_NAME: &str = "The borrower";

/// Sending half handed to services; enqueueing never blocks or fails the caller
#[derive(Clone)]
pub struct SideEffectQueue {
    tx: mpsc::UnboundedSender<BookingEvent>,
}

impl SideEffectQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BookingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish a committed event
    pub fn publish(&self, event: BookingEvent) {
        let booking_id = event.booking().booking_id;
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::warn!(booking_id, kind, "Side-effect worker is gone, event dropped");
        } else {
            tracing::debug!(booking_id, kind, "Booking event queued");
        }
    }
}

/// Consumes booking events and delivers their notifications and chat messages
pub struct SideEffectWorker {
    rx: mpsc::UnboundedReceiver<BookingEvent>,
    notifier: Arc<dyn Notifier>,
    messenger: Arc<dyn Messenger>,
    catalog: Arc<dyn Catalog>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl SideEffectWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<BookingEvent>,
        notifier: Arc<dyn Notifier>,
        messenger: Arc<dyn Messenger>,
        catalog: Arc<dyn Catalog>,
        max_attempts: u32,
    ) -> Self {
        Self {
            rx,
            notifier,
            messenger,
            catalog,
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Run until every queue handle has been dropped
    pub async fn run(mut self) {
        tracing::info!("Side-effect worker started");

        while let Some(event) = self.rx.recv().await {
            self.handle(event).await;
        }

        tracing::info!("Side-effect worker stopped");
    }

    async fn handle(&self, event: BookingEvent) {
        let booking_id = event.booking().booking_id;

        let borrower_name = if event.mentions_borrower() {
            self.borrower_name(event.booking().borrower_id).await
        } else {
            FALLBACK_BORROWER_NAME.to_string()
        };

        let notification = event.notification(&borrower_name);
        let message = event.system_message(&notification);

        if let Err(e) = self.deliver_notification(&notification).await {
            tracing::warn!(
                booking_id,
                kind = event.kind(),
                target = %notification.target_user_id,
                error = %e,
                "Notification not delivered"
            );
        }

        if let Some(message) = message {
            if let Err(e) = self.deliver_message(&message).await {
                tracing::warn!(
                    booking_id,
                    kind = event.kind(),
                    error = %e,
                    "System message not delivered"
                );
            }
        }
    }

    async fn borrower_name(&self, borrower_id: uuid::Uuid) -> String {
        match self.catalog.display_name(borrower_id).await {
            Ok(Some(name)) => name,
            Ok(None) => FALLBACK_BORROWER_NAME.to_string(),
            Err(e) => {
                tracing::warn!(borrower_id = %borrower_id, error = %e, "Borrower lookup failed");
                FALLBACK_BORROWER_NAME.to_string()
            }
        }
    }

    async fn deliver_notification(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let mut attempt = 1;
        loop {
            match self.notifier.notify(notification).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Retrying notification");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn deliver_message(&self, message: &SystemMessage) -> Result<(), DeliveryError> {
        let mut attempt = 1;
        loop {
            match self.messenger.send_system_message(message).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Retrying system message");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
