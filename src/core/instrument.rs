//! Currency pair identifier
//!
//! Inline-byte Copy type, no heap allocation per quote. The monitored pair
//! set is small and config-driven, so no global interning registry is needed.

use super::FixedPoint6;
use std::fmt;

/// Maximum length of an instrument name (e.g. "EUR/USD" is 7 bytes)
pub const MAX_INSTRUMENT_LEN: usize = 12;

/// A tradable currency pair, e.g. `EUR/USD` or `USD/JPY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instrument {
    bytes: [u8; MAX_INSTRUMENT_LEN],
    len: u8,
}

impl Instrument {
    /// Parse from string. Returns None if empty or longer than
    /// [`MAX_INSTRUMENT_LEN`].
    pub fn parse(name: &str) -> Option<Self> {
        let raw = name.as_bytes();
        if raw.is_empty() || raw.len() > MAX_INSTRUMENT_LEN {
            return None;
        }
        let mut bytes = [0u8; MAX_INSTRUMENT_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Self {
            bytes,
            len: raw.len() as u8,
        })
    }

    /// Instrument name as &str
    #[inline]
    pub fn as_str(&self) -> &str {
        // Constructed from a &str in parse(), so always valid UTF-8
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("INVALID")
    }

    /// True for JPY-quoted pairs, which use the 0.01 pip convention.
    #[inline]
    pub fn is_jpy_quoted(&self) -> bool {
        self.as_str().contains("JPY")
    }

    /// Pip size for this pair: 0.01 for JPY-quoted pairs, 0.0001 otherwise.
    /// Fixed naming convention, not configurable.
    #[inline]
    pub fn pip(&self) -> FixedPoint6 {
        if self.is_jpy_quoted() {
            FixedPoint6::from_raw(10_000) // 0.01
        } else {
            FixedPoint6::from_raw(100) // 0.0001
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
