//! Opportunity detector
//!
//! On every quote-store broadcast, compares all source pairs for the
//! instrument and emits a debounced opportunity when the slippage-adjusted
//! pip gap clears the configured threshold. Detection has no error
//! conditions: stale or missing legs are skipped silently.

use crate::core::{epoch_millis, FixedPoint6, Instrument, Quote, SourceId};
use crate::infrastructure::config::Config;
use crate::monitor::MarketSnapshot;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A detected cross-source arbitrage opportunity. Immutable once created;
/// consumed at most once by the executor.
#[derive(Debug, Clone)]
pub struct Opportunity {
    /// Unique per detection event
    pub id: Uuid,
    pub instrument: Instrument,
    pub buy_source: SourceId,
    pub sell_source: SourceId,
    /// Ask on the buy source
    pub buy_price: FixedPoint6,
    /// Bid on the sell source
    pub sell_price: FixedPoint6,
    /// sell_price - buy_price
    pub raw_diff: FixedPoint6,
    pub diff_pips: f64,
    /// diff_pips minus slippage compensation on both legs
    pub adjusted_diff_pips: f64,
    /// Trade size in base currency units
    pub size: i64,
    /// size x raw_diff (exact)
    pub expected_profit: FixedPoint6,
    /// Wall-clock millis at detection
    pub created_at: u64,
}

/// Directional dedup key: (X -> Y) and (Y -> X) debounce independently.
type OpportunityKey = (Instrument, SourceId, SourceId);

/// Listener invoked synchronously, once per accepted opportunity, in
/// registration order.
pub type OpportunityListener = Box<dyn Fn(&Opportunity) + Send>;

/// Detection policy, lifted from configuration.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Minimum adjusted pip difference to emit
    pub min_pip_difference: f64,
    /// Fixed trade size in base units (not derived from balance)
    pub trade_size_units: i64,
    /// Maximum quote age for a leg to be eligible
    pub max_quote_age: Duration,
    pub slippage_compensation: bool,
    /// Estimated slippage in pips, per leg
    pub estimated_slippage_pips: f64,
    /// Minimum interval between emissions for one directional key
    pub debounce: Duration,
}

impl DetectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_pip_difference: config.trading.min_pip_difference,
            trade_size_units: config.trading.trade_size_units,
            max_quote_age: Duration::from_millis(config.trading.max_quote_age_ms),
            slippage_compensation: config.trading.slippage_compensation,
            estimated_slippage_pips: config.trading.estimated_slippage_pips,
            debounce: Duration::from_millis(config.execution.debounce_ms),
        }
    }
}

/// Stateful detector: tracks last emission per directional key for
/// notification-storm suppression.
pub struct OpportunityDetector {
    settings: DetectorSettings,
    /// Last emission time per directional key. Suppressed candidates do NOT
    /// refresh the entry, so a burst inside the window cannot starve the key
    /// forever. This can mask a materially better opportunity for the same
    /// key arriving inside the window; accepted trade-off.
    last_emitted: HashMap<OpportunityKey, Instant>,
    listeners: Vec<OpportunityListener>,
}

impl OpportunityDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            last_emitted: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Register an opportunity listener
    pub fn subscribe(&mut self, listener: OpportunityListener) {
        self.listeners.push(listener);
    }

    /// Analyze one instrument's snapshot. Enumerates every unordered source
    /// pair (snapshot iteration is ordered, so enumeration is deterministic),
    /// gates both legs on freshness, then evaluates both directions
    /// independently. Returns the accepted opportunities in emission order.
    pub fn analyze(&mut self, snapshot: &MarketSnapshot) -> Vec<Opportunity> {
        let mut emitted = Vec::new();

        if snapshot.len() < 2 {
            return emitted;
        }

        let quotes: Vec<&Quote> = snapshot.values().collect();
        for i in 0..quotes.len() {
            for j in (i + 1)..quotes.len() {
                let (a, b) = (quotes[i], quotes[j]);

                // A stale or crossed leg disqualifies the whole pair; nothing
                // is emitted and it is not treated as a zero-value
                // opportunity.
                if !a.is_fresh(self.settings.max_quote_age)
                    || !b.is_fresh(self.settings.max_quote_age)
                    || !a.is_valid()
                    || !b.is_valid()
                {
                    continue;
                }

                self.evaluate_direction(a, b, &mut emitted);
                self.evaluate_direction(b, a, &mut emitted);
            }
        }

        emitted
    }

    /// Evaluate one direction: buy at `buy.ask`, sell at `sell.bid`.
    fn evaluate_direction(&mut self, buy: &Quote, sell: &Quote, out: &mut Vec<Opportunity>) {
        let raw_diff = match sell.bid.checked_sub(buy.ask) {
            Some(d) if d.is_positive() => d,
            _ => return,
        };

        let pip = buy.instrument.pip();
        let diff_pips = match raw_diff.ratio(pip) {
            Some(p) => p,
            None => return,
        };

        let mut adjusted_diff_pips = diff_pips;
        if self.settings.slippage_compensation {
            // Slippage is paid on both legs
            adjusted_diff_pips -= 2.0 * self.settings.estimated_slippage_pips;
        }

        if adjusted_diff_pips < self.settings.min_pip_difference {
            return;
        }

        let key = (buy.instrument, buy.source.clone(), sell.source.clone());
        if let Some(last) = self.last_emitted.get(&key) {
            if last.elapsed() < self.settings.debounce {
                return;
            }
        }
        self.last_emitted.insert(key, Instant::now());

        let expected_profit = raw_diff
            .scale_by_units(self.settings.trade_size_units)
            .unwrap_or(FixedPoint6::ZERO);

        let opportunity = Opportunity {
            id: Uuid::new_v4(),
            instrument: buy.instrument,
            buy_source: buy.source.clone(),
            sell_source: sell.source.clone(),
            buy_price: buy.ask,
            sell_price: sell.bid,
            raw_diff,
            diff_pips,
            adjusted_diff_pips,
            size: self.settings.trade_size_units,
            expected_profit,
            created_at: epoch_millis(),
        };

        for listener in &self.listeners {
            listener(&opportunity);
        }
        out.push(opportunity);
    }
}
