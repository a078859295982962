//! Core application engine
//!
//! Wires broker adapters to the quote store, detector and executor. All
//! adapter quote callbacks funnel into one mpsc channel so the reactor
//! mutates the store and detector from a single task at a time; executions
//! run as spawned tasks against the executor's own synchronized state.

use crate::brokers::Broker;
use crate::core::{Instrument, Quote};
use crate::detector::{DetectorSettings, Opportunity, OpportunityDetector};
use crate::executor::{Trade, TradeExecutor};
use crate::infrastructure::config::Config;
use crate::monitor::QuoteStore;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Observability events for external collaborators (logging, alerting).
/// Carries the full record in both cases.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Opportunity(Opportunity),
    TradeSettled(Trade),
}

/// Main engine managing the trading lifecycle
pub struct ArbEngine {
    config: Config,
    brokers: Vec<Arc<dyn Broker>>,
    executor: Arc<TradeExecutor>,
    events: broadcast::Sender<BotEvent>,
    auto_execute: Arc<AtomicBool>,
}

impl ArbEngine {
    pub fn new(config: Config, brokers: Vec<Arc<dyn Broker>>) -> Self {
        let executor = Arc::new(TradeExecutor::new(
            brokers.clone(),
            Duration::from_millis(config.execution.order_timeout_ms),
        ));
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            brokers,
            executor,
            events,
            auto_execute: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to opportunity / trade events
    pub fn subscribe_events(&self) -> broadcast::Receiver<BotEvent> {
        self.events.subscribe()
    }

    /// Executor handle, for ledger queries
    pub fn executor(&self) -> Arc<TradeExecutor> {
        self.executor.clone()
    }

    /// Arm or disarm automatic execution
    pub fn set_auto_execute(&self, enabled: bool) {
        self.auto_execute.store(enabled, Ordering::Release);
        tracing::info!(enabled, "automatic trading toggled");
    }

    /// Connect brokers, subscribe configured pairs and drive the pipeline.
    /// Runs until all quote feeds close.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(brokers = self.brokers.len(), "starting arbitrage engine");

        let instruments = self.parse_instruments();
        let (tx, mut rx) = mpsc::unbounded_channel::<Quote>();

        for broker in &self.brokers {
            let source = broker.source();
            // Callback and subscriptions are registered even on a failed
            // connect: the adapter owns reconnection, and once it recovers
            // its quotes must reach the loop.
            match broker.connect().await {
                Ok(()) => {
                    tracing::info!(%source, "broker connected");
                    match broker.account_balance().await {
                        Ok(balance) => tracing::info!(
                            %source,
                            available = %balance.available_balance,
                            currency = %balance.currency,
                            "account balance"
                        ),
                        Err(e) => tracing::warn!(%source, error = %e, "balance query failed"),
                    }
                }
                Err(e) => {
                    tracing::error!(%source, error = %e, "initial connect failed; adapter will retry");
                }
            }

            let tx = tx.clone();
            broker.on_quote(Box::new(move |quote| {
                // Engine loop gone means shutdown; drop quietly
                let _ = tx.send(quote);
            }));

            for instrument in &instruments {
                if let Err(e) = broker.subscribe_quotes(*instrument).await {
                    tracing::error!(%source, %instrument, error = %e, "subscription failed");
                } else {
                    tracing::debug!(%source, %instrument, "subscribed");
                }
            }
        }
        drop(tx);

        self.arm_after_warmup();
        self.spawn_summary_task();

        // Single-writer event loop over store + detector
        let mut store = QuoteStore::new();
        store.subscribe(Box::new(|instrument, snapshot| {
            tracing::trace!(%instrument, sources = snapshot.len(), "snapshot updated");
        }));

        let mut detector = OpportunityDetector::new(DetectorSettings::from_config(&self.config));
        let events = self.events.clone();
        detector.subscribe(Box::new(move |opportunity| {
            let _ = events.send(BotEvent::Opportunity(opportunity.clone()));
        }));

        tracing::info!("engine running, processing quotes");
        while let Some(quote) = rx.recv().await {
            let instrument = quote.instrument;
            store.update(quote);

            let snapshot = store.snapshot(instrument);
            for opportunity in detector.analyze(&snapshot) {
                tracing::info!(
                    id = %opportunity.id,
                    %instrument,
                    buy = %opportunity.buy_source,
                    sell = %opportunity.sell_source,
                    pips = opportunity.adjusted_diff_pips,
                    expected_profit = %opportunity.expected_profit,
                    "opportunity detected"
                );

                if self.auto_execute.load(Ordering::Acquire) {
                    let executor = self.executor.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        if let Some(trade) = executor.execute(&opportunity).await {
                            let _ = events.send(BotEvent::TradeSettled(trade));
                        }
                    });
                }
            }
        }

        tracing::info!("all quote feeds closed, engine stopping");
        Ok(())
    }

    /// Disconnect all brokers and log the final summary
    pub async fn shutdown(&self) {
        tracing::info!("shutting down");
        self.set_auto_execute(false);

        for broker in &self.brokers {
            let source = broker.source();
            if let Err(e) = broker.disconnect().await {
                tracing::warn!(%source, error = %e, "disconnect failed");
            } else {
                tracing::info!(%source, "disconnected");
            }
        }

        let summary = self.executor.profit_summary().await;
        tracing::info!(
            trades = summary.total_trades,
            profitable = summary.profitable_trades,
            unprofitable = summary.unprofitable_trades,
            total_profit = %summary.total_profit,
            average_profit = %summary.average_profit,
            "final statistics"
        );
    }

    fn parse_instruments(&self) -> Vec<Instrument> {
        self.config
            .trading
            .pairs
            .iter()
            .filter_map(|name| {
                let parsed = Instrument::parse(name);
                if parsed.is_none() {
                    tracing::warn!(pair = %name, "invalid instrument name, skipping");
                }
                parsed
            })
            .collect()
    }

    /// Arm auto-execution after the configured warm-up so the first quotes
    /// can populate the store before orders fly.
    fn arm_after_warmup(&self) {
        if !self.config.execution.auto_execute {
            return;
        }
        let flag = self.auto_execute.clone();
        let warmup = Duration::from_millis(self.config.execution.warmup_ms);
        tokio::spawn(async move {
            tokio::time::sleep(warmup).await;
            flag.store(true, Ordering::Release);
            tracing::info!("automatic trading armed after warm-up");
        });
    }

    fn spawn_summary_task(&self) {
        let executor = self.executor.clone();
        let period = Duration::from_secs(self.config.execution.summary_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let summary = executor.profit_summary().await;
                tracing::info!(
                    trades = summary.total_trades,
                    profitable = summary.profitable_trades,
                    total_profit = %summary.total_profit,
                    "periodic statistics"
                );
            }
        });
    }
}
