//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::services::GatewayConfig;
use checkout::{CheckoutConfig, DEFAULT_UTC_OFFSET_MINUTES, SweepPolicy, offset_from_minutes};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps everything in memory
/// - `GATEWAY_KEY_ID` / `GATEWAY_KEY_SECRET`: Razorpay credentials; unset uses the in-memory gateway
/// - `GATEWAY_BASE_URL`: gateway API root (default: `"https://api.razorpay.com"`)
/// - `GATEWAY_TIMEOUT_SECS`: outbound gateway timeout (default: `10`)
/// - `CURRENCY`: payment currency (default: `"INR"`)
/// - `SWEEP_INTERVAL_SECS`: timeout sweeper period (default: `60`)
/// - `BUSINESS_UTC_OFFSET_MINUTES`: business time zone (default: `330`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub gateway_key_id: Option<String>,
    pub gateway_key_secret: String,
    pub gateway_base_url: String,
    pub gateway_timeout_secs: u64,
    pub currency: String,
    pub sweep_interval_secs: u64,
    pub business_utc_offset_minutes: i32,
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_non_empty("HOST").unwrap_or(defaults.host),
            port: env_parsed("PORT").unwrap_or(defaults.port),
            log_level: env_non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: env_non_empty("DATABASE_URL"),
            gateway_key_id: env_non_empty("GATEWAY_KEY_ID"),
            gateway_key_secret: env_non_empty("GATEWAY_KEY_SECRET")
                .unwrap_or(defaults.gateway_key_secret),
            gateway_base_url: env_non_empty("GATEWAY_BASE_URL")
                .unwrap_or(defaults.gateway_base_url),
            gateway_timeout_secs: env_parsed("GATEWAY_TIMEOUT_SECS")
                .unwrap_or(defaults.gateway_timeout_secs),
            currency: env_non_empty("CURRENCY").unwrap_or(defaults.currency),
            sweep_interval_secs: env_parsed("SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval_secs),
            business_utc_offset_minutes: env_parsed("BUSINESS_UTC_OFFSET_MINUTES")
                .unwrap_or(defaults.business_utc_offset_minutes),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the checkout components.
    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig {
            sweep: SweepPolicy {
                interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
                ..SweepPolicy::default()
            },
            currency: self.currency.clone(),
            business_offset: offset_from_minutes(self.business_utc_offset_minutes),
            ..CheckoutConfig::default()
        }
    }

    /// Razorpay settings, present only when a key id is configured.
    pub fn gateway(&self) -> Option<GatewayConfig> {
        self.gateway_key_id.as_ref().map(|key_id| GatewayConfig {
            key_id: key_id.clone(),
            key_secret: self.gateway_key_secret.clone(),
            base_url: self.gateway_base_url.clone(),
            timeout: Duration::from_secs(self.gateway_timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            gateway_key_id: None,
            gateway_key_secret: "local_secret".to_string(),
            gateway_base_url: gateway.base_url,
            gateway_timeout_secs: gateway.timeout.as_secs(),
            currency: "INR".to_string(),
            sweep_interval_secs: 60,
            business_utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}
