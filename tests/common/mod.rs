//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;
use uuid::Uuid;

use rental_handoff::booking::{
    Booking, BookingChange, BookingStatus, BookingStore, Expected, InMemoryBookingStore,
    NewBooking, PartyRole, PaymentStatus,
};
use rental_handoff::catalog::{InMemoryCatalog, Product, UserProfile};
use rental_handoff::error::BookingError;
use rental_handoff::notify::{DeliveryError, Messenger, Notification, Notifier, SystemMessage};
use rental_handoff::settlement::processor::{CheckoutRequest, ProcessorSession};
use rental_handoff::settlement::{DummyProcessor, PaymentProcessor, SettlementSettings};
use rental_handoff::state::{AppState, Collaborators, ServiceSettings};

pub const SESSION_SECRET: &str = "test-session-secret";
pub const QR_SECRET: &str = "test-qr-secret";
pub const PRODUCT_ID: i64 = 1;
pub const PRICE_PER_DAY: i64 = 500;

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn titles_for(&self, user_id: Uuid) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.target_user_id == user_id)
            .map(|n| n.title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Failed("notification table offline".to_string()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<SystemMessage>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_system_message(&self, message: &SystemMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Sandbox processor that also records checkouts and expired sessions
pub struct RecordingProcessor {
    inner: DummyProcessor,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    pub expired: Mutex<Vec<String>>,
    /// When false, no session reports as paid
    pub sessions_paid: AtomicBool,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self {
            inner: DummyProcessor::new("https://rentals.test"),
            checkouts: Mutex::new(Vec::new()),
            expired: Mutex::new(Vec::new()),
            sessions_paid: AtomicBool::new(true),
        }
    }

    pub fn set_sessions_paid(&self, paid: bool) {
        self.sessions_paid.store(paid, Ordering::SeqCst);
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.checkouts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentProcessor for RecordingProcessor {
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<ProcessorSession, BookingError> {
        self.checkouts.lock().unwrap().push(request.clone());
        self.inner.create_checkout(request).await
    }

    async fn is_session_paid(&self, session_id: &str) -> Result<bool, BookingError> {
        if !self.sessions_paid.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.is_session_paid(session_id).await
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), BookingError> {
        self.expired.lock().unwrap().push(session_id.to_string());
        self.inner.expire_session(session_id).await
    }

    async fn create_payout_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<String, BookingError> {
        self.inner.create_payout_account(user_id, email).await
    }

    async fn onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, BookingError> {
        self.inner
            .onboarding_link(account_id, refresh_url, return_url)
            .await
    }

    fn is_sandbox(&self) -> bool {
        true
    }
}

/// Store whose reads rendezvous once armed, so that every concurrent caller
/// observes the same pre-transition row before any of them writes
pub struct BarrierStore {
    inner: Arc<InMemoryBookingStore>,
    barrier: Barrier,
    armed: AtomicBool,
}

impl BarrierStore {
    pub fn new(inner: Arc<InMemoryBookingStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for BarrierStore {
    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        self.inner.insert(booking).await
    }

    async fn get(&self, booking_id: i64) -> Result<Option<Booking>, BookingError> {
        let row = self.inner.get(booking_id).await?;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
        }
        Ok(row)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: Option<PartyRole>,
    ) -> Result<Vec<Booking>, BookingError> {
        self.inner.list_for_user(user_id, role).await
    }

    async fn has_overlap(
        &self,
        product_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, BookingError> {
        self.inner.has_overlap(product_id, start, end).await
    }

    async fn apply(
        &self,
        booking_id: i64,
        expected: Expected,
        change: BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookingError> {
        self.inner.apply(booking_id, expected, change, now).await
    }

    async fn clear_expired_token(
        &self,
        booking_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        self.inner.clear_expired_token(booking_id, now).await
    }
}

pub struct Harness {
    pub rows: Arc<InMemoryBookingStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub notifier: Arc<RecordingNotifier>,
    pub messenger: Arc<RecordingMessenger>,
    pub processor: Arc<RecordingProcessor>,
    pub state: AppState,
    pub lender: Uuid,
    pub borrower: Uuid,
}

pub struct HarnessOptions {
    pub notifier: RecordingNotifier,
    pub lender_onboarded: bool,
    pub barrier_parties: Option<usize>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            notifier: RecordingNotifier::default(),
            lender_onboarded: true,
            barrier_parties: None,
        }
    }
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        session_jwt_secret: SESSION_SECRET.to_string(),
        qr_signing_secret: QR_SECRET.to_string(),
        qr_token_ttl_seconds: 600,
        side_effect_max_attempts: 2,
        settlement: SettlementSettings {
            fee_bps: 1000,
            currency: "usd".to_string(),
            public_origin: "https://rentals.test".to_string(),
        },
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default()).0
    }

    /// Build the services; returns the barrier store when one was requested
    pub fn with_options(options: HarnessOptions) -> (Self, Option<Arc<BarrierStore>>) {
        let rows = Arc::new(InMemoryBookingStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let notifier = Arc::new(options.notifier);
        let messenger = Arc::new(RecordingMessenger::default());
        let processor = Arc::new(RecordingProcessor::new());

        let lender = Uuid::new_v4();
        let borrower = Uuid::new_v4();
        catalog.add_user(UserProfile {
            user_id: lender,
            name: Some("Lena".to_string()),
            email: Some("lena@example.com".to_string()),
            payout_account_id: options
                .lender_onboarded
                .then(|| "acct_lender_1".to_string()),
        });
        catalog.add_user(UserProfile {
            user_id: borrower,
            name: Some("Bo".to_string()),
            email: Some("bo@example.com".to_string()),
            payout_account_id: None,
        });
        catalog.add_product(Product {
            product_id: PRODUCT_ID,
            name: "Camping tent".to_string(),
            lender_id: lender,
            price_per_day: PRICE_PER_DAY,
        });

        let barrier = options
            .barrier_parties
            .map(|parties| Arc::new(BarrierStore::new(rows.clone(), parties)));
        let store: Arc<dyn BookingStore> = match &barrier {
            Some(barrier) => barrier.clone(),
            None => rows.clone(),
        };

        let (state, worker) = AppState::assemble(
            Collaborators {
                store,
                catalog: catalog.clone(),
                processor: processor.clone(),
                notifier: notifier.clone(),
                messenger: messenger.clone(),
                db_pool: None,
            },
            &settings(),
        );
        tokio::spawn(worker.with_retry_delay(Duration::from_millis(5)).run());

        (
            Self {
                rows,
                catalog,
                notifier,
                messenger,
                processor,
                state,
                lender,
                borrower,
            },
            barrier,
        )
    }

    /// Seed a booking of the harness product in the given state
    pub fn seed(&self, booking_id: i64, status: BookingStatus) -> Booking {
        let now = Utc::now();
        let collected = matches!(
            status,
            BookingStatus::Active | BookingStatus::Completed
        );
        let payment_status = match status {
            BookingStatus::Pending | BookingStatus::Confirmed => PaymentStatus::Pending,
            _ => PaymentStatus::Paid,
        };
        let booking = Booking {
            booking_id,
            product_id: PRODUCT_ID,
            borrower_id: self.borrower,
            lender_id: self.lender,
            start_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            total_amount: 1000,
            security_deposit: 0,
            status,
            collection_token_hash: None,
            collection_token_expires_at: None,
            collected_at: collected.then_some(now),
            collected_by: collected.then_some(self.borrower),
            collection_method: None,
            payment_intent_id: None,
            payment_status,
            dispute_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.rows.put(booking.clone());
        booking
    }

    pub fn row(&self, booking_id: i64) -> Booking {
        self.rows.snapshot(booking_id).expect("booking exists")
    }
}

/// Poll until `condition` holds or two seconds pass
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}
