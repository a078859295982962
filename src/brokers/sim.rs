//! In-process simulated broker
//!
//! Paper-trading adapter used by the binary and by tests. Feeds a synthetic
//! random-walk quote stream for subscribed instruments and fills market
//! orders against its own last quote. Tests can script fills and failures
//! per leg and add artificial order latency.

use super::{AccountBalance, Broker, BrokerError, OrderFill, OrderStatus, QuoteCallback};
use crate::core::{epoch_millis, FixedPoint6, Instrument, Quote, Side, SourceId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Scripted outcome for the next order on a given side
type ScriptedFill = Result<OrderFill, BrokerError>;

#[derive(Default)]
struct SimState {
    subscribed: BTreeSet<Instrument>,
    last_quote: HashMap<Instrument, (FixedPoint6, FixedPoint6)>,
    scripted: HashMap<Side, VecDeque<ScriptedFill>>,
    rng: u64,
}

/// Simulated broker adapter.
pub struct SimBroker {
    source: SourceId,
    connected: AtomicBool,
    /// When set, the next connect attempt is refused (consumed on use)
    fail_next_connect: AtomicBool,
    /// Delay applied to every order placement (zero by default)
    order_latency: Mutex<Duration>,
    /// Delay before a feed task retries while disconnected
    reconnect_delay: Duration,
    state: Mutex<SimState>,
    listeners: Mutex<Vec<QuoteCallback>>,
}

impl SimBroker {
    pub fn new(name: &str) -> Self {
        Self::with_reconnect_delay(name, Duration::from_millis(5000))
    }

    pub fn with_reconnect_delay(name: &str, reconnect_delay: Duration) -> Self {
        // Seed the walk differently per broker so two sims disagree on price
        let seed = name
            .bytes()
            .fold(0x9E37_79B9_7F4A_7C15u64, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x100_0000_01B3)
            })
            | 1;

        Self {
            source: SourceId::new(name),
            connected: AtomicBool::new(false),
            fail_next_connect: AtomicBool::new(false),
            order_latency: Mutex::new(Duration::ZERO),
            reconnect_delay,
            state: Mutex::new(SimState {
                rng: seed,
                ..SimState::default()
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Inject a quote as if it arrived from the wire. No-op while
    /// disconnected (a closed adapter delivers no callbacks).
    pub fn push_quote(&self, instrument: Instrument, bid: FixedPoint6, ask: FixedPoint6) {
        if !self.connected.load(Ordering::Acquire) {
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            state.last_quote.insert(instrument, (bid, ask));
        }
        let quote = Quote::new(instrument, self.source.clone(), bid, ask, epoch_millis());
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(quote.clone());
        }
    }

    /// Script the outcome of the next order on `side`. Scripted outcomes are
    /// consumed FIFO before the default fill-at-book behavior.
    pub fn script_fill(&self, side: Side, outcome: ScriptedFill) {
        let mut state = self.state.lock().unwrap();
        state.scripted.entry(side).or_default().push_back(outcome);
    }

    /// Convenience: script a fill at `price` for the next order on `side`.
    pub fn script_fill_at(&self, side: Side, price: FixedPoint6) {
        self.script_fill(
            side,
            Ok(OrderFill {
                order_id: Uuid::new_v4().to_string(),
                status: OrderStatus::Filled,
                executed_price: price,
                timestamp: epoch_millis(),
            }),
        );
    }

    /// Artificial latency applied to every subsequent order placement
    pub fn set_order_latency(&self, latency: Duration) {
        *self.order_latency.lock().unwrap() = latency;
    }

    /// Refuse the next connect attempt with a transport error
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::Release);
    }

    /// xorshift64 step; good enough for a synthetic price walk
    fn next_rand(state: &mut SimState) -> u64 {
        let mut x = state.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.rng = x;
        x
    }

    /// Advance the synthetic walk for one instrument and return (bid, ask)
    fn step_quote(&self, instrument: Instrument) -> (FixedPoint6, FixedPoint6) {
        let mut state = self.state.lock().unwrap();

        let (pip_raw, start_mid) = if instrument.is_jpy_quoted() {
            (10_000i64, FixedPoint6::from_raw(150_000_000)) // 150.0
        } else {
            (100i64, FixedPoint6::from_raw(1_100_000)) // 1.1
        };

        let mid = state
            .last_quote
            .get(&instrument)
            .map(|(bid, ask)| FixedPoint6::from_raw((bid.as_raw() + ask.as_raw()) / 2))
            .unwrap_or(start_mid);

        // Step up to +/- half a pip per tick
        let r = Self::next_rand(&mut state);
        let step = (r % (pip_raw as u64 + 1)) as i64 - pip_raw / 2;
        let new_mid = FixedPoint6::from_raw(mid.as_raw() + step);

        let half_spread = pip_raw / 2;
        let bid = FixedPoint6::from_raw(new_mid.as_raw() - half_spread);
        let ask = FixedPoint6::from_raw(new_mid.as_raw() + half_spread);
        state.last_quote.insert(instrument, (bid, ask));
        (bid, ask)
    }

    /// Spawn the synthetic feed: one tick for every subscribed instrument
    /// each `interval`. While disconnected the task idles for the configured
    /// reconnect delay instead of ticking.
    pub fn spawn_feed(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let broker = self;
        tokio::spawn(async move {
            loop {
                if !broker.connected.load(Ordering::Acquire) {
                    tokio::time::sleep(broker.reconnect_delay).await;
                    continue;
                }
                let subscribed: Vec<Instrument> = {
                    let state = broker.state.lock().unwrap();
                    state.subscribed.iter().copied().collect()
                };
                for instrument in subscribed {
                    let (bid, ask) = broker.step_quote(instrument);
                    broker.push_quote(instrument, bid, ask);
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[async_trait]
impl Broker for SimBroker {
    fn source(&self) -> SourceId {
        self.source.clone()
    }

    async fn connect(&self) -> Result<(), BrokerError> {
        if self.fail_next_connect.swap(false, Ordering::AcqRel) {
            return Err(BrokerError::Transport {
                broker: self.source.to_string(),
                reason: "connect refused".to_string(),
            });
        }
        // Idempotent; previously subscribed instruments keep streaming after
        // a reconnect because the subscription set survives disconnects.
        self.connected.store(true, Ordering::Release);
        tracing::debug!(source = %self.source, "sim broker connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.connected.store(false, Ordering::Release);
        tracing::debug!(source = %self.source, "sim broker disconnected");
        Ok(())
    }

    async fn subscribe_quotes(&self, instrument: Instrument) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.subscribed.insert(instrument);
        Ok(())
    }

    async fn place_market_order(
        &self,
        instrument: Instrument,
        side: Side,
        size: i64,
    ) -> Result<OrderFill, BrokerError> {
        let latency = *self.order_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if !self.connected.load(Ordering::Acquire) {
            return Err(BrokerError::NotConnected {
                broker: self.source.to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        if let Some(outcome) = state.scripted.get_mut(&side).and_then(VecDeque::pop_front) {
            return outcome;
        }

        let (bid, ask) = state.last_quote.get(&instrument).copied().ok_or_else(|| {
            BrokerError::Rejected {
                broker: self.source.to_string(),
                reason: format!("no market for {}", instrument),
            }
        })?;

        let executed_price = match side {
            Side::Buy => ask,
            Side::Sell => bid,
        };

        tracing::debug!(
            source = %self.source,
            %instrument,
            %side,
            size,
            price = %executed_price,
            "sim order filled"
        );

        Ok(OrderFill {
            order_id: Uuid::new_v4().to_string(),
            status: OrderStatus::Filled,
            executed_price,
            timestamp: epoch_millis(),
        })
    }

    async fn account_balance(&self) -> Result<AccountBalance, BrokerError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(BrokerError::NotConnected {
                broker: self.source.to_string(),
            });
        }
        Ok(AccountBalance {
            total_balance: FixedPoint6::from_raw(100_000 * FixedPoint6::SCALE),
            available_balance: FixedPoint6::from_raw(100_000 * FixedPoint6::SCALE),
            currency: "USD".to_string(),
        })
    }

    fn on_quote(&self, callback: QuoteCallback) {
        self.listeners.lock().unwrap().push(callback);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn eur_usd() -> Instrument {
        Instrument::parse("EUR/USD").unwrap()
    }

    fn px(v: f64) -> FixedPoint6 {
        FixedPoint6::from_f64(v).unwrap()
    }

    #[tokio::test]
    async fn test_quotes_only_flow_while_connected() {
        let broker = SimBroker::new("alpha");
        let count = Arc::new(AtomicUsize::new(0));
        let count_in_cb = count.clone();
        broker.on_quote(Box::new(move |_| {
            count_in_cb.fetch_add(1, Ordering::SeqCst);
        }));

        // Disconnected: callbacks must not fire
        broker.push_quote(eur_usd(), px(1.1050), px(1.1051));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        broker.connect().await.unwrap();
        broker.push_quote(eur_usd(), px(1.1050), px(1.1051));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        broker.disconnect().await.unwrap();
        broker.push_quote(eur_usd(), px(1.1050), px(1.1051));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fill_at_book() {
        let broker = SimBroker::new("alpha");
        broker.connect().await.unwrap();
        broker.push_quote(eur_usd(), px(1.10500), px(1.10510));

        let buy = broker
            .place_market_order(eur_usd(), Side::Buy, 10_000)
            .await
            .unwrap();
        assert_eq!(buy.executed_price, px(1.10510));
        assert_eq!(buy.status, OrderStatus::Filled);

        let sell = broker
            .place_market_order(eur_usd(), Side::Sell, 10_000)
            .await
            .unwrap();
        assert_eq!(sell.executed_price, px(1.10500));
        assert_ne!(buy.order_id, sell.order_id);
    }

    #[tokio::test]
    async fn test_scripted_outcomes_consumed_fifo() {
        let broker = SimBroker::new("alpha");
        broker.connect().await.unwrap();
        broker.push_quote(eur_usd(), px(1.10500), px(1.10510));

        broker.script_fill_at(Side::Buy, px(1.10512));
        broker.script_fill(
            Side::Buy,
            Err(BrokerError::Rejected {
                broker: "alpha".to_string(),
                reason: "liquidity gone".to_string(),
            }),
        );

        let first = broker
            .place_market_order(eur_usd(), Side::Buy, 10_000)
            .await
            .unwrap();
        assert_eq!(first.executed_price, px(1.10512));

        let second = broker.place_market_order(eur_usd(), Side::Buy, 10_000).await;
        assert!(matches!(second, Err(BrokerError::Rejected { .. })));

        // Queue drained: back to fill-at-book
        let third = broker
            .place_market_order(eur_usd(), Side::Buy, 10_000)
            .await
            .unwrap();
        assert_eq!(third.executed_price, px(1.10510));
    }

    #[tokio::test]
    async fn test_order_requires_market() {
        let broker = SimBroker::new("alpha");
        broker.connect().await.unwrap();
        let result = broker.place_market_order(eur_usd(), Side::Buy, 10_000).await;
        assert!(matches!(result, Err(BrokerError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_order_while_disconnected() {
        let broker = SimBroker::new("alpha");
        let result = broker.place_market_order(eur_usd(), Side::Buy, 10_000).await;
        assert!(matches!(result, Err(BrokerError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn test_subscriptions_survive_reconnect() {
        let broker = Arc::new(SimBroker::new("alpha"));
        broker.connect().await.unwrap();
        broker.subscribe_quotes(eur_usd()).await.unwrap();
        broker.disconnect().await.unwrap();
        broker.connect().await.unwrap();

        let state = broker.state.lock().unwrap();
        assert!(state.subscribed.contains(&eur_usd()));
    }

    #[tokio::test]
    async fn test_synthetic_walk_produces_valid_quotes() {
        let broker = SimBroker::new("alpha");
        broker.connect().await.unwrap();
        for _ in 0..50 {
            let (bid, ask) = broker.step_quote(eur_usd());
            assert!(bid < ask);
        }
    }
}
