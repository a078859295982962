//! Broker adapter interface
//!
//! The core depends only on this capability trait, never on a concrete
//! venue. Adapters own their wire concerns (framing, auth,
//! reconnect-with-backoff, re-subscription after an unplanned disconnect);
//! the core sees quotes via `on_quote` and outcomes via `place_market_order`.

pub mod sim;

use crate::core::{FixedPoint6, Instrument, Quote, Side, SourceId};
use async_trait::async_trait;
use thiserror::Error;

pub use sim::SimBroker;

/// Adapter-side failure taxonomy.
///
/// The originating venue is carried as `broker` (a `source` field would be
/// treated as an error cause by the derive).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("order rejected by {broker}: {reason}")]
    Rejected { broker: String, reason: String },

    #[error("transport error on {broker}: {reason}")]
    Transport { broker: String, reason: String },

    #[error("request to {broker} timed out")]
    Timeout { broker: String },

    #[error("{broker} is not connected")]
    NotConnected { broker: String },
}

/// Order placement outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFill {
    pub order_id: String,
    pub status: OrderStatus,
    pub executed_price: FixedPoint6,
    /// Broker-reported execution time, millis since epoch
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Filled,
}

/// Account balance snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub total_balance: FixedPoint6,
    pub available_balance: FixedPoint6,
    pub currency: String,
}

/// Push callback for quote delivery; invoked at most once per underlying
/// market update.
pub type QuoteCallback = Box<dyn Fn(Quote) + Send + Sync>;

/// Capability interface for a quote/order source.
///
/// Object safe (`Arc<dyn Broker>`) so the executor can resolve handles by
/// [`SourceId`] at runtime.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Source identifier, stable for the life of the adapter
    fn source(&self) -> SourceId;

    /// Idempotent: establishes connectivity and resumes quote delivery for
    /// any previously requested instruments.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Releases resources; no quote callbacks fire afterward.
    async fn disconnect(&self) -> Result<(), BrokerError>;

    /// Request ongoing quote delivery for an instrument.
    async fn subscribe_quotes(&self, instrument: Instrument) -> Result<(), BrokerError>;

    /// Place a market order; fails with a [`BrokerError`] on rejection or
    /// transport failure.
    async fn place_market_order(
        &self,
        instrument: Instrument,
        side: Side,
        size: i64,
    ) -> Result<OrderFill, BrokerError>;

    /// Current account balance at this source
    async fn account_balance(&self) -> Result<AccountBalance, BrokerError>;

    /// Register a push listener for quote updates
    fn on_quote(&self, callback: QuoteCallback);

    fn is_connected(&self) -> bool;
}
