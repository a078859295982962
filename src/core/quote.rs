//! Quote and broker identity types

use super::{FixedPoint6, Instrument};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Identifier of an independent quote/order source (a broker or venue).
///
/// Cheap to clone; `Ord` so that pair enumeration over a snapshot is
/// deterministic for a fixed set of sources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 1,
    Sell = 2,
}

impl Side {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best bid/ask from one source at a point in time.
///
/// `received_at` is stamped with local monotonic time at ingestion and is the
/// only clock used for freshness: a source feeding old timestamps under
/// network delay is still treated as stale.
#[derive(Debug, Clone)]
pub struct Quote {
    pub instrument: Instrument,
    pub source: SourceId,
    pub bid: FixedPoint6,
    pub ask: FixedPoint6,
    /// Source-reported timestamp (millis since epoch); informational only,
    /// never compared across sources.
    pub source_timestamp: u64,
    /// Local receipt time
    pub received_at: Instant,
}

impl Quote {
    /// Create a quote stamped with the current local time
    pub fn new(
        instrument: Instrument,
        source: SourceId,
        bid: FixedPoint6,
        ask: FixedPoint6,
        source_timestamp: u64,
    ) -> Self {
        Self {
            instrument,
            source,
            bid,
            ask,
            source_timestamp,
            received_at: Instant::now(),
        }
    }

    /// Age of the quote since local receipt
    #[inline]
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// True iff the quote was received within `max_age`
    #[inline]
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() <= max_age
    }

    /// Sanity check: bid strictly below ask
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.bid < self.ask
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
#[inline]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
