//! Configuration management
//!
//! Loads configuration from config.toml at startup (path overridable via
//! CONFIG_PATH). Every field has a serde default so a partial or missing
//! file still yields a runnable configuration. Policy intervals that the
//! reference behavior hardcoded (debounce window, reconnect delay) live here
//! with the same default values.

use serde::{Deserialize, Serialize};

/// Top-level configuration, consumed by the core as an immutable struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Broker adapters to instantiate
    #[serde(default)]
    pub brokers: Vec<BrokerConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Detection-side trading parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Currency pairs to monitor for arbitrage opportunities
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,

    /// Minimum adjusted price difference to trigger an opportunity (pips)
    #[serde(default = "default_min_pip_difference")]
    pub min_pip_difference: f64,

    /// Trade size in base currency units
    #[serde(default = "default_trade_size")]
    pub trade_size_units: i64,

    /// Maximum acceptable quote age (milliseconds, local receipt time)
    #[serde(default = "default_max_quote_age")]
    pub max_quote_age_ms: u64,

    /// Subtract estimated slippage on both legs before thresholding
    #[serde(default = "default_true")]
    pub slippage_compensation: bool,

    /// Estimated slippage in pips, per leg
    #[serde(default = "default_slippage_pips")]
    pub estimated_slippage_pips: f64,
}

/// Execution-side parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Execute detected opportunities automatically
    #[serde(default)]
    pub auto_execute: bool,

    /// Minimum interval between opportunity notifications for the same
    /// directional source pair (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Deadline for both order legs to settle (milliseconds)
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,

    /// Delay before auto-execution arms after startup (milliseconds)
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Interval between periodic profit summary logs (seconds)
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

/// One broker adapter instance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub name: String,

    /// Delay before a disconnected adapter retries (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: String,

    /// Default tracing filter (overridable via RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            pairs: default_pairs(),
            min_pip_difference: default_min_pip_difference(),
            trade_size_units: default_trade_size(),
            max_quote_age_ms: default_max_quote_age(),
            slippage_compensation: default_true(),
            estimated_slippage_pips: default_slippage_pips(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            auto_execute: false,
            debounce_ms: default_debounce_ms(),
            order_timeout_ms: default_order_timeout_ms(),
            warmup_ms: default_warmup_ms(),
            summary_interval_secs: default_summary_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

fn default_pairs() -> Vec<String> {
    vec![
        "EUR/USD".to_string(),
        "GBP/USD".to_string(),
        "USD/JPY".to_string(),
    ]
}

fn default_min_pip_difference() -> f64 {
    1.5
}

fn default_trade_size() -> i64 {
    10_000 // 0.1 standard lot
}

fn default_max_quote_age() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_slippage_pips() -> f64 {
    0.5
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_order_timeout_ms() -> u64 {
    5000
}

fn default_warmup_ms() -> u64 {
    5000
}

fn default_summary_interval() -> u64 {
    60
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from config.toml (or CONFIG_PATH).
    ///
    /// Missing file falls back to defaults.
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> crate::Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(|e| crate::ArbError::Config(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(crate::ArbError::Io(e)),
        }
    }
}
