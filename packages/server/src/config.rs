use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Without a provider key the flow verifies codes local-only.
    pub prelude_api_key: Option<String>,
    pub prelude_base_url: Option<String>,
    /// Messaging gateway webhook; unset means codes are logged, not sent.
    pub delivery_webhook_url: Option<String>,
    pub session_service_url: String,
    pub session_service_key: String,
    pub synthetic_address_domain: String,
    pub provider_timeout_ms: u64,
    /// Provider failure/timeout falls back to the local code comparison when
    /// true; counts as rejection when false. See DESIGN.md.
    pub provider_fail_open: bool,
    pub resend_cooldown_secs: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            prelude_api_key: env::var("PRELUDE_API_KEY").ok(),
            prelude_base_url: env::var("PRELUDE_BASE_URL").ok(),
            delivery_webhook_url: env::var("DELIVERY_WEBHOOK_URL").ok(),
            session_service_url: env::var("SESSION_SERVICE_URL")
                .context("SESSION_SERVICE_URL must be set")?,
            session_service_key: env::var("SESSION_SERVICE_KEY")
                .context("SESSION_SERVICE_KEY must be set")?,
            synthetic_address_domain: env::var("SYNTHETIC_ADDRESS_DOMAIN")
                .unwrap_or_else(|_| "login.vitrina.app".to_string()),
            provider_timeout_ms: env::var("PROVIDER_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PROVIDER_TIMEOUT_MS must be a valid number")?,
            provider_fail_open: env::var("PROVIDER_FAIL_OPEN")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            resend_cooldown_secs: env::var("RESEND_COOLDOWN_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("RESEND_COOLDOWN_SECS must be a valid number")?,
        })
    }
}
