//! Application state shared across handlers

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::SessionVerifier;
use crate::booking::{BookingService, BookingStore};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::handoff::{HandoffCoordinator, TokenService};
use crate::notify::{Messenger, Notifier, SideEffectQueue, SideEffectWorker};
use crate::settlement::{PaymentProcessor, SettlementGateway, SettlementSettings};

/// Storage and delivery backends the services run on
pub struct Collaborators {
    pub store: Arc<dyn BookingStore>,
    pub catalog: Arc<dyn Catalog>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub notifier: Arc<dyn Notifier>,
    pub messenger: Arc<dyn Messenger>,
    pub db_pool: Option<PgPool>,
}

/// Service settings resolved from configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub session_jwt_secret: String,
    pub qr_signing_secret: String,
    pub qr_token_ttl_seconds: i64,
    pub side_effect_max_attempts: u32,
    pub settlement: SettlementSettings,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            session_jwt_secret: config.session_jwt_secret.clone(),
            qr_signing_secret: config.qr_signing_secret.clone(),
            qr_token_ttl_seconds: config.qr_token_ttl_seconds,
            side_effect_max_attempts: config.side_effect_max_attempts,
            settlement: SettlementSettings {
                fee_bps: config.platform_fee_bps,
                currency: config.payment_currency.clone(),
                public_origin: config.public_origin.clone(),
            },
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub booking_service: Arc<BookingService>,
    pub token_service: Arc<TokenService>,
    pub handoff_coordinator: Arc<HandoffCoordinator>,
    pub settlement_gateway: Arc<SettlementGateway>,
    pub session_verifier: Arc<SessionVerifier>,
    /// Absent when running against in-memory stores
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        booking_service: Arc<BookingService>,
        token_service: Arc<TokenService>,
        handoff_coordinator: Arc<HandoffCoordinator>,
        settlement_gateway: Arc<SettlementGateway>,
        session_verifier: Arc<SessionVerifier>,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            booking_service,
            token_service,
            handoff_coordinator,
            settlement_gateway,
            session_verifier,
            db_pool,
        }
    }

    /// Wire every service onto the given backends.
    ///
    /// The returned worker must be spawned for notifications and chat
    /// messages to be delivered.
    pub fn assemble(collaborators: Collaborators, settings: &ServiceSettings) -> (Self, SideEffectWorker) {
        let (side_effects, rx) = SideEffectQueue::new();

        let worker = SideEffectWorker::new(
            rx,
            collaborators.notifier,
            collaborators.messenger,
            collaborators.catalog.clone(),
            settings.side_effect_max_attempts,
        );

        let token_service = Arc::new(TokenService::new(
            collaborators.store.clone(),
            &settings.qr_signing_secret,
            settings.qr_token_ttl_seconds,
        ));

        let handoff_coordinator = Arc::new(HandoffCoordinator::new(
            collaborators.store.clone(),
            token_service.clone(),
            side_effects.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            collaborators.store.clone(),
            collaborators.catalog.clone(),
            side_effects.clone(),
        ));

        let settlement_gateway = Arc::new(SettlementGateway::new(
            collaborators.store,
            collaborators.catalog,
            collaborators.processor,
            side_effects,
            settings.settlement.clone(),
        ));

        let state = Self::new(
            booking_service,
            token_service,
            handoff_coordinator,
            settlement_gateway,
            Arc::new(SessionVerifier::new(&settings.session_jwt_secret)),
            collaborators.db_pool,
        );

        (state, worker)
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_service.clone()
    }
}

impl FromRef<AppState> for Arc<HandoffCoordinator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.handoff_coordinator.clone()
    }
}

impl FromRef<AppState> for Arc<SettlementGateway> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.settlement_gateway.clone()
    }
}

impl FromRef<AppState> for Arc<SessionVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session_verifier.clone()
    }
}
