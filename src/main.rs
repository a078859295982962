//! Cross-broker forex arbitrage bot
//!
//! # Architecture
//! - **core**: domain types (FixedPoint6, Instrument, Quote)
//! - **monitor**: latest-quote store with snapshot broadcast
//! - **detector**: slippage-adjusted opportunity detection with debounce
//! - **executor**: idempotent dual-leg execution and trade ledger
//! - **brokers**: adapter seam (paper-trading SimBroker in this binary)
//! - **infrastructure**: cold path (config, logging)

use fx_arb::brokers::{Broker, SimBroker};
use fx_arb::engine::ArbEngine;
use fx_arb::infrastructure::{config::Config, logging};
use fx_arb::Result;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let _guards = logging::init_logging(&config.logging)?;

    tracing::info!("initializing forex arbitrage bot");

    // Paper-trading adapters; wire-level brokers plug in behind the same
    // trait without touching the core.
    let broker_configs = if config.brokers.is_empty() {
        tracing::warn!("no brokers configured, starting two paper brokers");
        vec![
            fx_arb::infrastructure::config::BrokerConfig {
                name: "sim-alpha".to_string(),
                reconnect_delay_ms: 5000,
            },
            fx_arb::infrastructure::config::BrokerConfig {
                name: "sim-beta".to_string(),
                reconnect_delay_ms: 5000,
            },
        ]
    } else {
        config.brokers.clone()
    };

    let mut brokers: Vec<Arc<dyn Broker>> = Vec::new();
    let mut sims = Vec::new();
    for broker_config in &broker_configs {
        let sim = Arc::new(SimBroker::with_reconnect_delay(
            &broker_config.name,
            Duration::from_millis(broker_config.reconnect_delay_ms),
        ));
        sims.push(sim.clone());
        brokers.push(sim as Arc<dyn Broker>);
    }

    let engine = Arc::new(ArbEngine::new(config, brokers));

    // Synthetic market data for the paper brokers
    for sim in &sims {
        sim.clone().spawn_feed(Duration::from_millis(100));
    }

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(fx_arb::ArbError::Io)?;
    tracing::info!("received ctrl-c");

    engine.shutdown().await;
    runner.abort();

    Ok(())
}
