//! Core domain types
//!
//! - FixedPoint6: fixed-point arithmetic for prices and profits
//! - Instrument: currency pair with pip-size convention
//! - SourceId / Side / Quote: broker identity and market data

pub mod fixed_point;
pub mod instrument;
pub mod quote;

pub use fixed_point::FixedPoint6;
pub use instrument::Instrument;
pub use quote::{epoch_millis, Quote, Side, SourceId};
