use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{circuit_breaker::CircuitBreakerConfig, retry::RetryConfig};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub database_url: String,

    pub redis_url: String,
    pub seen_cache_ttl_seconds: u64,
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: u64,

    pub account_api_url: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub account_api_timeout_seconds: u64,

    pub mail_api_url: String,
    pub mail_api_token: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub mail_api_timeout_seconds: u64,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub circuit_breaker_success_threshold: u32,

    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_dispatch_concurrency")]
    pub dispatch_concurrency: usize,
    #[serde(default = "default_run_deadline_seconds")]
    pub run_deadline_seconds: u64,

    #[serde(default)]
    pub display_utc_offset_minutes: i32,

    pub server_port: u16,
}

fn default_cache_timeout_ms() -> u64 {
    500
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_mail_from() -> String {
    "no-reply@evemail-bridge.appspotmail.com".to_string()
}

fn default_dispatch_concurrency() -> usize {
    1
}

fn default_run_deadline_seconds() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;

        if config.dispatch_concurrency == 0 {
            return Err(anyhow!("DISPATCH_CONCURRENCY must be at least 1"));
        }
        config.display_offset()?;

        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout_seconds: self.circuit_breaker_timeout_seconds,
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }

    /// Time zone used for byline timestamps.
    pub fn display_offset(&self) -> Result<FixedOffset, Error> {
        FixedOffset::east_opt(self.display_utc_offset_minutes * 60).ok_or_else(|| {
            anyhow!(
                "DISPLAY_UTC_OFFSET_MINUTES out of range: {}",
                self.display_utc_offset_minutes
            )
        })
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_seconds)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}
