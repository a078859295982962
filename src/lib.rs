//! Cross-broker forex arbitrage bot
//!
//! Core library: quote aggregation, opportunity detection and dual-leg
//! execution against multiple broker adapters.

pub mod brokers;
pub mod core;
pub mod detector;
pub mod engine;
pub mod executor;
pub mod infrastructure;
pub mod monitor;

// Re-export commonly used types
pub use infrastructure::config::{Config, ExecutionConfig, TradingConfig};

use thiserror::Error;

/// Main error type for the arbitrage bot
#[derive(Error, Debug)]
pub enum ArbError {
    #[error("Broker error: {0}")]
    Broker(#[from] brokers::BrokerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ArbError>;
