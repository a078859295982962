//! Infrastructure - cold path only
//!
//! Non-latency-critical code: configuration management and logging setup.

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::init_logging;
