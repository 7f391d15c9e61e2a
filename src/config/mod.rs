//! Configuration management for the ROI watcher.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Longest watch a single session may be configured for (30 days).
pub const MAX_MONITORING_SECONDS: u64 = 30 * 24 * 3600;

/// Largest allowed stale-evidence grace period (1 day).
pub const MAX_STALE_GRACE_SECS: u64 = 24 * 3600;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Trading engine API endpoint
    #[serde(default)]
    pub api: ApiConfig,
    /// Polling, fees and ROI thresholds
    #[serde(default)]
    pub watch: WatchConfig,
    /// Structured log used to confirm closures
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the trading engine
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the open positions endpoint
    #[serde(default = "default_positions_path")]
    pub positions_path: String,
    /// Per-request timeout in seconds (must be shorter than the poll interval)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Session length before a watch gives up
    #[serde(default = "default_max_monitoring")]
    pub max_monitoring_seconds: u64,
    /// Taker fee rate charged on each leg (0.0004 = 0.04%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Required ROI percentage per trading mode
    #[serde(default = "default_threshold_by_mode")]
    pub threshold_by_mode: HashMap<String, Decimal>,
    /// Required ROI percentage for modes missing from the table
    #[serde(default = "default_threshold")]
    pub default_threshold: Decimal,
    /// Custom ROI percentage per symbol (0 = use mode threshold)
    #[serde(default)]
    pub symbol_overrides: HashMap<String, Decimal>,
    /// Number of recent ROI samples shown in summaries
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Log checks allowed while a close is still in progress
    #[serde(default = "default_confirmation_attempts")]
    pub confirmation_attempts: u32,
    /// Gap (in ROI points) below which progress is critical
    #[serde(default = "default_critical_gap")]
    pub critical_gap: Decimal,
    /// Gap (in ROI points) below which progress is close
    #[serde(default = "default_close_gap")]
    pub close_gap: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Path to the engine's JSON-lines log
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// Number of most recent lines searched for a closure
    #[serde(default = "default_lookback_lines")]
    pub lookback_lines: usize,
    /// Maximum bytes read from the end of the log
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: u64,
    /// Log read timeout in seconds (must be shorter than the poll interval)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Message phrases that mark a completed close
    #[serde(default = "default_completion_markers")]
    pub completion_markers: Vec<String>,
    /// Message phrases that mark a close in progress
    #[serde(default = "default_progress_markers")]
    pub progress_markers: Vec<String>,
    /// Records older than session start minus this many seconds are stale
    #[serde(default = "default_stale_grace")]
    pub stale_grace_secs: u64,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8094".to_string()
}

fn default_positions_path() -> String {
    "/api/futures/ginie/autopilot/positions".to_string()
}

fn default_request_timeout() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_monitoring() -> u64 {
    3600 // 1 hour
}

fn default_fee_rate() -> Decimal {
    Decimal::new(4, 4) // 0.0004 (0.04% taker)
}

fn default_threshold_by_mode() -> HashMap<String, Decimal> {
    HashMap::from([
        ("ultra_fast".to_string(), Decimal::new(3, 0)),
        ("scalp".to_string(), Decimal::new(5, 0)),
        ("swing".to_string(), Decimal::new(8, 0)),
        ("position".to_string(), Decimal::new(10, 0)),
    ])
}

fn default_threshold() -> Decimal {
    Decimal::new(8, 0) // 8% ROI
}

fn default_history_window() -> usize {
    10
}

fn default_confirmation_attempts() -> u32 {
    3
}

fn default_critical_gap() -> Decimal {
    Decimal::new(5, 1) // 0.5 ROI points
}

fn default_close_gap() -> Decimal {
    Decimal::ONE
}

fn default_log_path() -> String {
    "server.log".to_string()
}

fn default_lookback_lines() -> usize {
    500
}

fn default_tail_bytes() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_read_timeout() -> u64 {
    5
}

fn default_completion_markers() -> Vec<String> {
    vec![
        "full close order placed".to_string(),
        "booking profit early".to_string(),
    ]
}

fn default_progress_markers() -> Vec<String> {
    vec!["closing position".to_string()]
}

fn default_stale_grace() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ROIW"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let poll = self.watch.poll_interval_seconds;

        anyhow::ensure!(poll > 0, "poll_interval_seconds must be > 0");

        anyhow::ensure!(
            self.api.request_timeout_secs > 0 && self.api.request_timeout_secs < poll,
            "request_timeout_secs must be > 0 and shorter than poll_interval_seconds"
        );

        anyhow::ensure!(
            self.evidence.read_timeout_secs > 0 && self.evidence.read_timeout_secs < poll,
            "read_timeout_secs must be > 0 and shorter than poll_interval_seconds"
        );

        anyhow::ensure!(
            self.watch.max_monitoring_seconds > 0
                && self.watch.max_monitoring_seconds <= MAX_MONITORING_SECONDS,
            "max_monitoring_seconds must be between 1 and {}",
            MAX_MONITORING_SECONDS
        );

        anyhow::ensure!(
            self.evidence.stale_grace_secs <= MAX_STALE_GRACE_SECS,
            "stale_grace_secs must be at most {}",
            MAX_STALE_GRACE_SECS
        );

        anyhow::ensure!(
            self.watch.fee_rate >= Decimal::ZERO && self.watch.fee_rate < Decimal::ONE,
            "fee_rate must be between 0 and 1"
        );

        anyhow::ensure!(
            self.watch.default_threshold > Decimal::ZERO,
            "default_threshold must be > 0"
        );

        for (mode, threshold) in &self.watch.threshold_by_mode {
            anyhow::ensure!(
                *threshold > Decimal::ZERO,
                "threshold for mode '{}' must be > 0",
                mode
            );
        }

        for (symbol, threshold) in &self.watch.symbol_overrides {
            anyhow::ensure!(
                *threshold >= Decimal::ZERO,
                "override for symbol '{}' must not be negative",
                symbol
            );
        }

        anyhow::ensure!(
            self.watch.confirmation_attempts >= 1,
            "confirmation_attempts must be >= 1"
        );

        anyhow::ensure!(
            self.watch.critical_gap <= self.watch.close_gap,
            "critical_gap must not exceed close_gap"
        );

        anyhow::ensure!(
            self.evidence.lookback_lines > 0,
            "lookback_lines must be > 0"
        );

        anyhow::ensure!(
            !self.evidence.completion_markers.is_empty(),
            "at least one completion marker is required"
        );

        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            positions_path: default_positions_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            max_monitoring_seconds: default_max_monitoring(),
            fee_rate: default_fee_rate(),
            threshold_by_mode: default_threshold_by_mode(),
            default_threshold: default_threshold(),
            symbol_overrides: HashMap::new(),
            history_window: default_history_window(),
            confirmation_attempts: default_confirmation_attempts(),
            critical_gap: default_critical_gap(),
            close_gap: default_close_gap(),
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            lookback_lines: default_lookback_lines(),
            tail_bytes: default_tail_bytes(),
            read_timeout_secs: default_read_timeout(),
            completion_markers: default_completion_markers(),
            progress_markers: default_progress_markers(),
            stale_grace_secs: default_stale_grace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.watch.threshold_by_mode.get("swing"), Some(&dec!(8)));
        assert_eq!(config.watch.fee_rate, dec!(0.0004));
    }

    #[test]
    fn test_timeout_must_be_shorter_than_poll_interval() {
        let mut config = Config::default();
        config.watch.poll_interval_seconds = 5;
        config.api.request_timeout_secs = 5;
        assert!(config.validate().is_err());

        config.api.request_timeout_secs = 4;
        config.evidence.read_timeout_secs = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_thresholds() {
        let mut config = Config::default();
        config
            .watch
            .threshold_by_mode
            .insert("scalp".to_string(), Decimal::ZERO);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch.default_threshold = dec!(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let mut config = Config::default();
        config.watch.max_monitoring_seconds = u64::MAX;
        assert!(config.validate().is_err());

        config.watch.max_monitoring_seconds = MAX_MONITORING_SECONDS;
        assert!(config.validate().is_ok());

        config.evidence.stale_grace_secs = MAX_STALE_GRACE_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "watch": { "poll_interval_seconds": 5, "fee_rate": "0.0005" } }"#,
        )
        .unwrap();

        assert_eq!(config.watch.poll_interval_seconds, 5);
        assert_eq!(config.watch.fee_rate, dec!(0.0005));
        assert_eq!(config.watch.max_monitoring_seconds, 3600);
        assert_eq!(config.api.positions_path, default_positions_path());
        assert_eq!(config.evidence.lookback_lines, 500);
    }
}
