//! Quote store
//!
//! Holds the latest quote per (instrument, source) and a local-receipt
//! timestamp used for freshness checks. Written only from the engine's event
//! loop (single-writer discipline), so no internal locking.

use crate::core::{Instrument, Quote, SourceId};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Cross-source view of one instrument: latest quote per source, ordered by
/// source id so iteration is deterministic.
pub type MarketSnapshot = BTreeMap<SourceId, Quote>;

/// Listener invoked synchronously after every update, in subscription order.
pub type SnapshotListener = Box<dyn Fn(Instrument, &MarketSnapshot) + Send>;

/// Latest-quote store for all monitored instruments.
///
/// One live quote per (instrument, source): a newer update unconditionally
/// replaces the older one (last-write-wins, no ordering guarantee on the
/// source-reported timestamps across sources). Quotes are only ever
/// overwritten, never removed.
#[derive(Default)]
pub struct QuoteStore {
    quotes: HashMap<Instrument, MarketSnapshot>,
    listeners: Vec<SnapshotListener>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Record a quote, replacing any prior quote for the same
    /// (instrument, source), then broadcast the instrument's full snapshot
    /// to all listeners.
    pub fn update(&mut self, quote: Quote) {
        let instrument = quote.instrument;
        let per_source = self.quotes.entry(instrument).or_default();
        per_source.insert(quote.source.clone(), quote);

        let snapshot = &self.quotes[&instrument];
        for listener in &self.listeners {
            listener(instrument, snapshot);
        }
    }

    /// Latest stored quote for (instrument, source), if any
    pub fn get(&self, instrument: Instrument, source: &SourceId) -> Option<&Quote> {
        self.quotes.get(&instrument)?.get(source)
    }

    /// Cross-source snapshot for an instrument (empty if nothing stored)
    pub fn snapshot(&self, instrument: Instrument) -> MarketSnapshot {
        self.quotes.get(&instrument).cloned().unwrap_or_default()
    }

    /// True iff a quote exists and its local receipt time is within
    /// `max_age`. Freshness never consults the source-reported timestamp.
    pub fn is_fresh(&self, instrument: Instrument, source: &SourceId, max_age: Duration) -> bool {
        self.get(instrument, source)
            .map(|q| q.is_fresh(max_age))
            .unwrap_or(false)
    }

    /// Register a snapshot listener. Listeners fire synchronously after each
    /// update, in subscription order.
    pub fn subscribe(&mut self, listener: SnapshotListener) {
        self.listeners.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{epoch_millis, FixedPoint6};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn eur_usd() -> Instrument {
        Instrument::parse("EUR/USD").unwrap()
    }

    fn quote(source: &str, bid: f64, ask: f64) -> Quote {
        Quote::new(
            eur_usd(),
            SourceId::new(source),
            FixedPoint6::from_f64(bid).unwrap(),
            FixedPoint6::from_f64(ask).unwrap(),
            epoch_millis(),
        )
    }

    #[test]
    fn test_update_replaces_never_appends() {
        let mut store = QuoteStore::new();
        store.update(quote("alpha", 1.1050, 1.1051));
        store.update(quote("alpha", 1.1060, 1.1061));

        let snap = store.snapshot(eur_usd());
        assert_eq!(snap.len(), 1);
        let q = store.get(eur_usd(), &SourceId::new("alpha")).unwrap();
        assert_eq!(q.bid, FixedPoint6::from_f64(1.1060).unwrap());
    }

    #[test]
    fn test_one_entry_per_source() {
        let mut store = QuoteStore::new();
        store.update(quote("alpha", 1.1050, 1.1051));
        store.update(quote("beta", 1.1055, 1.1056));
        assert_eq!(store.snapshot(eur_usd()).len(), 2);
    }

    #[test]
    fn test_get_absent() {
        let store = QuoteStore::new();
        assert!(store.get(eur_usd(), &SourceId::new("alpha")).is_none());
        assert!(!store.is_fresh(eur_usd(), &SourceId::new("alpha"), Duration::from_secs(1)));
    }

    #[test]
    fn test_freshness_bound() {
        let mut store = QuoteStore::new();
        let mut stale = quote("alpha", 1.1050, 1.1051);
        stale.received_at = Instant::now() - Duration::from_millis(600);
        store.update(stale);
        store.update(quote("beta", 1.1055, 1.1056));

        let max_age = Duration::from_millis(500);
        assert!(!store.is_fresh(eur_usd(), &SourceId::new("alpha"), max_age));
        assert!(store.is_fresh(eur_usd(), &SourceId::new("beta"), max_age));
    }

    #[test]
    fn test_listeners_fire_in_subscription_order() {
        let mut store = QuoteStore::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            store.subscribe(Box::new(move |_, _| {
                order.lock().unwrap().push(tag);
            }));
        }

        store.update(quote("alpha", 1.1050, 1.1051));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_listener_sees_full_snapshot() {
        let mut store = QuoteStore::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = seen.clone();
        store.subscribe(Box::new(move |_, snap| {
            seen_in_cb.store(snap.len(), Ordering::SeqCst);
        }));

        store.update(quote("alpha", 1.1050, 1.1051));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        store.update(quote("beta", 1.1055, 1.1056));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_source_order_deterministic() {
        let mut store = QuoteStore::new();
        store.update(quote("zeta", 1.1050, 1.1051));
        store.update(quote("alpha", 1.1055, 1.1056));

        let sources: Vec<_> = store
            .snapshot(eur_usd())
            .keys()
            .map(|s| s.as_str().to_string())
            .collect();
        assert_eq!(sources, vec!["alpha", "zeta"]);
    }
}
