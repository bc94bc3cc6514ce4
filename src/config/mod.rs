//! Configuration management for the rental handoff service
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

const DEV_SESSION_SECRET: &str = "development-session-secret-change-in-production";
const DEV_QR_SECRET: &str = "development-qr-secret-change-in-production";

pub const MAX_QR_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Rate limit: requests per second per IP
    pub rate_limit_rps: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Shared secret of the identity provider's session tokens
    pub session_jwt_secret: String,

    /// Secret for signing collection tokens
    pub qr_signing_secret: String,

    /// Collection token lifetime (default: 600 = 10 minutes)
    pub qr_token_ttl_seconds: i64,

    /// Platform commission in basis points (default: 1000 = 10%)
    pub platform_fee_bps: u32,

    pub stripe_secret_key: Option<String>,

    pub stripe_api_base: String,

    /// Fabricate processor sessions instead of calling Stripe
    pub settlement_dummy_mode: bool,

    /// Public origin of the web app, used for redirect URLs
    pub public_origin: String,

    /// ISO currency code of checkout sessions
    pub payment_currency: String,

    /// Delivery attempts per notification or chat message
    pub side_effect_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build and validate configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let rate_limit_rps = lookup("RATE_LIMIT_RPS")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(100);

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS");

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let session_jwt_secret = secret(
            &lookup,
            "SESSION_JWT_SECRET",
            DEV_SESSION_SECRET,
            &environment,
        )?;
        let qr_signing_secret = secret(&lookup, "QR_SIGNING_SECRET", DEV_QR_SECRET, &environment)?;
        if qr_signing_secret == session_jwt_secret {
            return Err(ConfigError::InvalidValue(
                "QR_SIGNING_SECRET must differ from SESSION_JWT_SECRET".to_string(),
            ));
        }

        let qr_token_ttl_seconds = parse_or(&lookup, "QR_TOKEN_TTL_SECONDS", 600i64)?;
        if !(1..=MAX_QR_TOKEN_TTL_SECONDS).contains(&qr_token_ttl_seconds) {
            return Err(ConfigError::InvalidValue(format!(
                "QR_TOKEN_TTL_SECONDS must be between 1 and {}",
                MAX_QR_TOKEN_TTL_SECONDS
            )));
        }

        let platform_fee_bps = parse_or(&lookup, "PLATFORM_FEE_BPS", 1000u32)?;
        if platform_fee_bps > 10_000 {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_FEE_BPS must be between 0 and 10000".to_string(),
            ));
        }

        let settlement_dummy_mode = parse_or(&lookup, "SETTLEMENT_DUMMY_MODE", false)?;
        let stripe_secret_key = lookup("STRIPE_SECRET_KEY").filter(|s| !s.trim().is_empty());

        if settlement_dummy_mode && environment.is_production() {
            return Err(ConfigError::InvalidValue(
                "SETTLEMENT_DUMMY_MODE cannot be enabled in production".to_string(),
            ));
        }
        if !settlement_dummy_mode && stripe_secret_key.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "STRIPE_SECRET_KEY (or set SETTLEMENT_DUMMY_MODE=true outside production)"
                    .to_string(),
            ));
        }

        let stripe_api_base =
            lookup("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string());

        let public_origin =
            lookup("PUBLIC_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let payment_currency = lookup("PAYMENT_CURRENCY")
            .unwrap_or_else(|| "usd".to_string())
            .to_lowercase();
        if payment_currency.len() != 3 || !payment_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::InvalidValue(format!(
                "PAYMENT_CURRENCY must be a 3-letter ISO code, got '{}'",
                payment_currency
            )));
        }

        let side_effect_max_attempts = parse_or(&lookup, "SIDE_EFFECT_MAX_ATTEMPTS", 3u32)?;
        if side_effect_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SIDE_EFFECT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            rate_limit_rps,
            cors_allowed_origins,
            log_level,
            session_jwt_secret,
            qr_signing_secret,
            qr_token_ttl_seconds,
            platform_fee_bps,
            stripe_secret_key,
            stripe_api_base,
            settlement_dummy_mode,
            public_origin,
            payment_currency,
            side_effect_max_attempts,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

/// Secrets fall back to development values everywhere except production
fn secret<F>(
    lookup: &F,
    key: &str,
    dev_default: &str,
    environment: &Environment,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|s| !s.is_empty()) {
        Some(value) => Ok(value),
        None if environment.is_production() => Err(ConfigError::MissingEnvVar(key.to_string())),
        None => {
            tracing::warn!(key, "Using development secret");
            Ok(dev_default.to_string())
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has an invalid value: '{}'", key, raw))),
        None => Ok(default),
    }
}
