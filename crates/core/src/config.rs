//! Configuration management for Custodia.
//!
//! All sections carry serde defaults so a partial TOML file is enough:
//!
//! ```toml
//! [anchor]
//! network = "ethereum-sepolia"
//! submit_timeout_ms = 15000
//!
//! [anchor.retry]
//! max_retries = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;
use crate::time::{MILLIS_PER_DAY, MILLIS_PER_HOUR};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Exponential backoff policy for transient failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), doubling and capped.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Anchor network label recorded on every anchor reference
    #[serde(default = "default_network")]
    pub network: String,
    /// Upper bound on a whole submission including retries
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,
    /// Upper bound on a confirmation lookup during verification
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            submit_timeout_ms: default_submit_timeout(),
            confirm_timeout_ms: default_confirm_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Lifetime of a break-glass grant
    #[serde(default = "default_break_glass_duration")]
    pub break_glass_duration_ms: u64,
    /// Refuse break-glass when no audit logger is attached
    #[serde(default = "default_true")]
    pub require_audit_for_break_glass: bool,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            break_glass_duration_ms: default_break_glass_duration(),
            require_audit_for_break_glass: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Score points removed per warning
    #[serde(default = "default_warning_penalty")]
    pub warning_penalty: u8,
    /// Documents expiring within this window get an `ExpiresSoon` warning
    #[serde(default = "default_expiry_warning_window")]
    pub expiry_warning_window_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            warning_penalty: default_warning_penalty(),
            expiry_warning_window_ms: default_expiry_warning_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    200
}

fn default_max_delay() -> u64 {
    5_000
}

fn default_network() -> String {
    "custodia-anchor".to_string()
}

fn default_submit_timeout() -> u64 {
    30_000
}

fn default_confirm_timeout() -> u64 {
    5_000
}

fn default_break_glass_duration() -> u64 {
    24 * MILLIS_PER_HOUR
}

fn default_true() -> bool {
    true
}

fn default_warning_penalty() -> u8 {
    5
}

fn default_expiry_warning_window() -> u64 {
    30 * MILLIS_PER_DAY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make retries or scoring meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        let retry = &self.anchor.retry;
        if retry.initial_delay_ms == 0 {
            return Err(invalid("anchor.retry.initial_delay_ms", "must be > 0"));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(invalid(
                "anchor.retry.max_delay_ms",
                "must be >= initial_delay_ms",
            ));
        }
        if self.anchor.submit_timeout_ms == 0 {
            return Err(invalid("anchor.submit_timeout_ms", "must be > 0"));
        }
        if self.anchor.confirm_timeout_ms == 0 {
            return Err(invalid("anchor.confirm_timeout_ms", "must be > 0"));
        }
        if self.verification.warning_penalty > 100 {
            return Err(invalid("verification.warning_penalty", "must be <= 100"));
        }
        if self.consent.break_glass_duration_ms == 0 {
            return Err(invalid("consent.break_glass_duration_ms", "must be > 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> CoreError {
    CoreError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
