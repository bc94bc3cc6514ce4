//! Rental handoff backend server
//!
//! Serves the booking lifecycle, QR handoff and settlement APIs on top of
//! Postgres, with Stripe Connect (or the sandbox processor) for payments.

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use rental_handoff::booking::PgBookingStore;
use rental_handoff::catalog::PgCatalog;
use rental_handoff::config::Config;
use rental_handoff::middleware::RateLimiter;
use rental_handoff::notify::{PgMessenger, PgNotifier};
use rental_handoff::settlement::{DummyProcessor, PaymentProcessor, StripeProcessor};
use rental_handoff::state::{AppState, Collaborators, ServiceSettings};
use rental_handoff::{db, routes};

/// Scans allowed per client: a short burst, then one every two seconds
const SCAN_BURST: f64 = 5.0;
const SCAN_REFILL_PER_SECOND: f64 = 0.5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        fee_bps = config.platform_fee_bps,
        qr_ttl_seconds = config.qr_token_ttl_seconds,
        "Starting rental handoff server"
    );

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let processor: Arc<dyn PaymentProcessor> = if config.settlement_dummy_mode {
        tracing::warn!("SETTLEMENT_DUMMY_MODE enabled: payments are simulated");
        Arc::new(DummyProcessor::new(&config.public_origin))
    } else {
        let secret_key = config
            .stripe_secret_key
            .as_deref()
            .context("STRIPE_SECRET_KEY is required outside dummy mode")?;
        Arc::new(StripeProcessor::new(&config.stripe_api_base, secret_key)?)
    };

    let collaborators = Collaborators {
        store: Arc::new(PgBookingStore::new(db_pool.clone())),
        catalog: Arc::new(PgCatalog::new(db_pool.clone())),
        processor,
        notifier: Arc::new(PgNotifier::new(db_pool.clone())),
        messenger: Arc::new(PgMessenger::new(db_pool.clone())),
        db_pool: Some(db_pool),
    };

    let (app_state, side_effect_worker) =
        AppState::assemble(collaborators, &ServiceSettings::from(&config));

    // Deliver notifications and chat messages in the background
    let worker_handle = tokio::spawn(side_effect_worker.run());

    let global_limiter = RateLimiter::new("global", config.rate_limit_rps);
    let scan_limiter = RateLimiter::with_burst("collect", SCAN_REFILL_PER_SECOND, SCAN_BURST);

    // Drop idle buckets so the limiter maps stay bounded
    {
        let global = global_limiter.clone();
        let scan = scan_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                global.cleanup(Duration::from_secs(300)).await;
                scan.cleanup(Duration::from_secs(300)).await;
            }
        });
    }

    let mut app = routes::api_router(app_state, global_limiter, scan_limiter)
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));
    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(
            rental_handoff::middleware::hsts_header,
        ));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router owned the last queue handles; the worker drains and exits
    if tokio::time::timeout(Duration::from_secs(10), worker_handle)
        .await
        .is_err()
    {
        tracing::warn!("Side-effect worker did not drain before shutdown");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins_str = allowed_origins.unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
