use crate::error::{CheckoutError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Poll every 3 seconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
/// Give up verification after 60 seconds.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 60_000;
/// Keep the success state on screen for 2 seconds before closing.
pub const DEFAULT_SUCCESS_DISPLAY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Settings for the checkout orchestrator and its adapters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub script_id: String,
    pub script_url: String,
    pub container_id: String,
    /// Base URL of the backend serving `GET /verification`.
    pub verification_base_url: String,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub success_display_delay_ms: u64,
    pub log: LogConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            script_id: "checkout-sdk".to_string(),
            script_url: "https://checkout.example.com/sdk/checkout.js".to_string(),
            container_id: "checkout-frame".to_string(),
            verification_base_url: "http://localhost:8080".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            success_display_delay_ms: DEFAULT_SUCCESS_DISPLAY_DELAY_MS,
            log: LogConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads a JSON config file; missing keys keep their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(CheckoutError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(CheckoutError::Config(
                "poll_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms > self.poll_timeout_ms {
            return Err(CheckoutError::Config(
                "poll_interval_ms must not exceed poll_timeout_ms".to_string(),
            ));
        }
        for (name, value) in [
            ("script_id", &self.script_id),
            ("script_url", &self.script_url),
            ("container_id", &self.container_id),
        ] {
            if value.trim().is_empty() {
                return Err(CheckoutError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn success_display_delay(&self) -> Duration {
        Duration::from_millis(self.success_display_delay_ms)
    }
}
