//! Trade executor
//!
//! Claims an opportunity idempotently, places both legs concurrently against
//! the two named brokers, reconciles the results into a Trade record and
//! appends it to the in-memory ledger. The ledger is the sole
//! failure-reporting channel: nothing in here propagates an error to the
//! caller.

use crate::brokers::{Broker, BrokerError, OrderFill};
use crate::core::{epoch_millis, FixedPoint6, Instrument, Side, SourceId};
use crate::detector::Opportunity;
use futures_util::future;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Outcome of a dual-leg execution.
///
/// `PartiallyExecuted` is deliberately distinct from `Failed`: one leg filled
/// and the book now holds an unhedged position on that leg, which needs
/// manual intervention. `Failed` means no exposure was taken (or the attempt
/// timed out before reconciliation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStatus {
    Completed,
    PartiallyExecuted { filled_leg: Side },
    Failed,
}

/// Immutable record of one execution attempt, appended to the ledger.
#[derive(Debug, Clone)]
pub struct Trade {
    pub opportunity_id: Uuid,
    pub instrument: Instrument,
    pub buy_source: SourceId,
    pub sell_source: SourceId,
    pub size: i64,
    pub expected_profit: FixedPoint6,
    pub actual_buy_price: Option<FixedPoint6>,
    pub actual_sell_price: Option<FixedPoint6>,
    /// size x (actual_sell - actual_buy); completed trades only
    pub actual_profit: Option<FixedPoint6>,
    /// expected_profit - actual_profit; completed trades only
    pub slippage: Option<FixedPoint6>,
    pub buy_order_id: Option<String>,
    pub sell_order_id: Option<String>,
    pub status: TradeStatus,
    pub error: Option<String>,
    /// Wall-clock millis when the record was written
    pub completed_at: u64,
}

impl Trade {
    fn skeleton(opportunity: &Opportunity) -> Self {
        Self {
            opportunity_id: opportunity.id,
            instrument: opportunity.instrument,
            buy_source: opportunity.buy_source.clone(),
            sell_source: opportunity.sell_source.clone(),
            size: opportunity.size,
            expected_profit: opportunity.expected_profit,
            actual_buy_price: None,
            actual_sell_price: None,
            actual_profit: None,
            slippage: None,
            buy_order_id: None,
            sell_order_id: None,
            status: TradeStatus::Failed,
            error: None,
            completed_at: 0,
        }
    }
}

/// Aggregate over completed trades only; failed and partial executions carry
/// no realized profit figure and are excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfitSummary {
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub unprofitable_trades: usize,
    pub total_profit: FixedPoint6,
    pub average_profit: FixedPoint6,
}

/// In-flight claim set and trade ledger, guarded together: one writer at a
/// time across both structures.
#[derive(Default)]
struct ExecutorState {
    in_flight: HashSet<Uuid>,
    history: Vec<Trade>,
}

/// Coordinates dual-leg executions against resolved broker handles.
pub struct TradeExecutor {
    brokers: HashMap<SourceId, Arc<dyn Broker>>,
    /// Deadline for both legs to settle; on expiry the claim is released and
    /// the attempt is recorded as failed.
    order_timeout: Duration,
    state: Mutex<ExecutorState>,
}

impl TradeExecutor {
    pub fn new(brokers: Vec<Arc<dyn Broker>>, order_timeout: Duration) -> Self {
        let brokers = brokers
            .into_iter()
            .map(|b| (b.source(), b))
            .collect();
        Self {
            brokers,
            order_timeout,
            state: Mutex::new(ExecutorState::default()),
        }
    }

    /// Execute an opportunity: claim it, fire both market orders
    /// concurrently, reconcile, record.
    ///
    /// Returns `None` if the opportunity id is already in flight (duplicate
    /// notification or re-entrant call); otherwise returns the Trade that was
    /// appended to the ledger, whatever its status. Never returns an error.
    pub async fn execute(&self, opportunity: &Opportunity) -> Option<Trade> {
        {
            let mut state = self.state.lock().await;
            if !state.in_flight.insert(opportunity.id) {
                tracing::debug!(id = %opportunity.id, "duplicate execution attempt ignored");
                return None;
            }
        }

        let trade = self.run_legs(opportunity).await;

        match &trade.status {
            TradeStatus::Completed => tracing::info!(
                id = %trade.opportunity_id,
                instrument = %trade.instrument,
                profit = %trade.actual_profit.unwrap_or(FixedPoint6::ZERO),
                "trade completed"
            ),
            TradeStatus::PartiallyExecuted { filled_leg } => tracing::error!(
                id = %trade.opportunity_id,
                instrument = %trade.instrument,
                leg = %filled_leg,
                error = trade.error.as_deref().unwrap_or(""),
                "UNHEDGED: one leg filled, the other failed; manual intervention required"
            ),
            TradeStatus::Failed => tracing::warn!(
                id = %trade.opportunity_id,
                instrument = %trade.instrument,
                error = trade.error.as_deref().unwrap_or(""),
                "trade failed"
            ),
        }

        let mut state = self.state.lock().await;
        state.history.push(trade.clone());
        state.in_flight.remove(&opportunity.id);
        Some(trade)
    }

    async fn run_legs(&self, opportunity: &Opportunity) -> Trade {
        let mut trade = Trade::skeleton(opportunity);

        let buy_broker = self.brokers.get(&opportunity.buy_source);
        let sell_broker = self.brokers.get(&opportunity.sell_source);
        let (buy_broker, sell_broker) = match (buy_broker, sell_broker) {
            (Some(b), Some(s)) => (b, s),
            _ => {
                let missing = if buy_broker.is_none() {
                    &opportunity.buy_source
                } else {
                    &opportunity.sell_source
                };
                trade.error = Some(format!("unknown source: {}", missing));
                trade.completed_at = epoch_millis();
                return trade;
            }
        };

        // Both legs fly together; neither is raced against the other. The
        // whole point is to minimize the gap between quoting and filling.
        let buy_leg = buy_broker.place_market_order(
            opportunity.instrument,
            Side::Buy,
            opportunity.size,
        );
        let sell_leg = sell_broker.place_market_order(
            opportunity.instrument,
            Side::Sell,
            opportunity.size,
        );

        let settled = tokio::time::timeout(self.order_timeout, future::join(buy_leg, sell_leg));
        match settled.await {
            Err(_) => {
                trade.error = Some(format!(
                    "execution timed out after {}ms before both legs settled",
                    self.order_timeout.as_millis()
                ));
            }
            Ok((buy_result, sell_result)) => {
                self.reconcile(&mut trade, opportunity, buy_result, sell_result);
            }
        }

        trade.completed_at = epoch_millis();
        trade
    }

    fn reconcile(
        &self,
        trade: &mut Trade,
        opportunity: &Opportunity,
        buy_result: Result<OrderFill, BrokerError>,
        sell_result: Result<OrderFill, BrokerError>,
    ) {
        match (buy_result, sell_result) {
            (Ok(buy), Ok(sell)) => {
                let actual_profit = sell
                    .executed_price
                    .checked_sub(buy.executed_price)
                    .and_then(|diff| diff.scale_by_units(opportunity.size))
                    .unwrap_or(FixedPoint6::ZERO);
                let slippage = opportunity
                    .expected_profit
                    .checked_sub(actual_profit)
                    .unwrap_or(FixedPoint6::ZERO);

                trade.actual_buy_price = Some(buy.executed_price);
                trade.actual_sell_price = Some(sell.executed_price);
                trade.actual_profit = Some(actual_profit);
                trade.slippage = Some(slippage);
                trade.buy_order_id = Some(buy.order_id);
                trade.sell_order_id = Some(sell.order_id);
                trade.status = TradeStatus::Completed;
            }
            (Ok(buy), Err(err)) => {
                trade.actual_buy_price = Some(buy.executed_price);
                trade.buy_order_id = Some(buy.order_id);
                trade.status = TradeStatus::PartiallyExecuted {
                    filled_leg: Side::Buy,
                };
                trade.error = Some(format!("sell leg failed: {}", err));
            }
            (Err(err), Ok(sell)) => {
                trade.actual_sell_price = Some(sell.executed_price);
                trade.sell_order_id = Some(sell.order_id);
                trade.status = TradeStatus::PartiallyExecuted {
                    filled_leg: Side::Sell,
                };
                trade.error = Some(format!("buy leg failed: {}", err));
            }
            (Err(buy_err), Err(sell_err)) => {
                trade.error = Some(format!(
                    "buy leg failed: {}; sell leg failed: {}",
                    buy_err, sell_err
                ));
            }
        }
    }

    /// Full ordered ledger
    pub async fn trade_history(&self) -> Vec<Trade> {
        self.state.lock().await.history.clone()
    }

    /// Profit aggregation over completed trades only
    pub async fn profit_summary(&self) -> ProfitSummary {
        let state = self.state.lock().await;
        let completed: Vec<&Trade> = state
            .history
            .iter()
            .filter(|t| t.status == TradeStatus::Completed)
            .collect();

        let total_trades = completed.len();
        let mut profitable_trades = 0;
        let mut total_profit = FixedPoint6::ZERO;
        for trade in &completed {
            let profit = trade.actual_profit.unwrap_or(FixedPoint6::ZERO);
            if profit.is_positive() {
                profitable_trades += 1;
            }
            total_profit = total_profit.checked_add(profit).unwrap_or(total_profit);
        }

        let average_profit = if total_trades > 0 {
            FixedPoint6::from_raw(total_profit.as_raw() / total_trades as i64)
        } else {
            FixedPoint6::ZERO
        };

        ProfitSummary {
            total_trades,
            profitable_trades,
            unprofitable_trades: total_trades - profitable_trades,
            total_profit,
            average_profit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokers::SimBroker;
    use crate::core::Instrument;

    fn px(v: f64) -> FixedPoint6 {
        FixedPoint6::from_f64(v).unwrap()
    }

    fn eur_usd() -> Instrument {
        Instrument::parse("EUR/USD").unwrap()
    }

    fn opportunity() -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            instrument: eur_usd(),
            buy_source: SourceId::new("alpha"),
            sell_source: SourceId::new("beta"),
            buy_price: px(1.10510),
            sell_price: px(1.10550),
            raw_diff: px(0.00040),
            diff_pips: 4.0,
            adjusted_diff_pips: 3.0,
            size: 10_000,
            expected_profit: px(4.0),
            created_at: epoch_millis(),
        }
    }

    async fn connected_pair() -> (Arc<SimBroker>, Arc<SimBroker>) {
        let alpha = Arc::new(SimBroker::new("alpha"));
        let beta = Arc::new(SimBroker::new("beta"));
        alpha.connect().await.unwrap();
        beta.connect().await.unwrap();
        (alpha, beta)
    }

    fn executor(alpha: &Arc<SimBroker>, beta: &Arc<SimBroker>) -> TradeExecutor {
        TradeExecutor::new(
            vec![alpha.clone() as Arc<dyn Broker>, beta.clone() as Arc<dyn Broker>],
            Duration::from_millis(5000),
        )
    }

    #[tokio::test]
    async fn test_completed_trade_exact_arithmetic() {
        let (alpha, beta) = connected_pair().await;
        alpha.script_fill_at(Side::Buy, px(1.10512));
        beta.script_fill_at(Side::Sell, px(1.10545));
        let executor = executor(&alpha, &beta);

        let trade = executor.execute(&opportunity()).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Completed);
        assert_eq!(trade.actual_buy_price, Some(px(1.10512)));
        assert_eq!(trade.actual_sell_price, Some(px(1.10545)));
        // actual_profit = 10_000 x 0.00033 = 3.3, slippage = 4.0 - 3.3 = 0.7
        assert_eq!(trade.actual_profit, Some(px(3.3)));
        assert_eq!(trade.slippage, Some(px(0.7)));
        assert!(trade.buy_order_id.is_some());
        assert!(trade.sell_order_id.is_some());
        assert!(trade.error.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_concurrent_execute_writes_one_trade() {
        let (alpha, beta) = connected_pair().await;
        alpha.script_fill_at(Side::Buy, px(1.10512));
        beta.script_fill_at(Side::Sell, px(1.10545));
        // Hold the first execution open long enough for the second call to
        // observe the in-flight claim.
        alpha.set_order_latency(Duration::from_millis(50));
        let executor = executor(&alpha, &beta);

        let opp = opportunity();
        let (first, second) = tokio::join!(executor.execute(&opp), executor.execute(&opp));
        assert_eq!(first.is_some() as u8 + second.is_some() as u8, 1);
        assert_eq!(executor.trade_history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_released_after_completion() {
        let (alpha, beta) = connected_pair().await;
        alpha.push_quote(eur_usd(), px(1.10500), px(1.10510));
        beta.push_quote(eur_usd(), px(1.10550), px(1.10560));
        let executor = executor(&alpha, &beta);

        let opp = opportunity();
        assert!(executor.execute(&opp).await.is_some());
        // Claim is gone once the record is written
        assert!(executor.execute(&opp).await.is_some());
        assert_eq!(executor.trade_history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_records_failed_trade() {
        let (alpha, _) = connected_pair().await;
        let executor = TradeExecutor::new(
            vec![alpha as Arc<dyn Broker>],
            Duration::from_millis(5000),
        );

        let trade = executor.execute(&opportunity()).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Failed);
        assert!(trade.error.as_deref().unwrap().contains("unknown source: beta"));
        assert!(trade.buy_order_id.is_none());
        assert!(trade.sell_order_id.is_none());
    }

    #[tokio::test]
    async fn test_sell_leg_failure_is_partial_not_failed() {
        let (alpha, beta) = connected_pair().await;
        alpha.script_fill_at(Side::Buy, px(1.10512));
        beta.script_fill(
            Side::Sell,
            Err(BrokerError::Rejected {
                broker: "beta".to_string(),
                reason: "liquidity gone".to_string(),
            }),
        );
        let executor = executor(&alpha, &beta);

        let trade = executor.execute(&opportunity()).await.unwrap();
        // Unhedged buy leg must be distinguishable from "neither leg placed"
        assert_eq!(
            trade.status,
            TradeStatus::PartiallyExecuted {
                filled_leg: Side::Buy
            }
        );
        assert!(trade.buy_order_id.is_some());
        assert_eq!(trade.actual_buy_price, Some(px(1.10512)));
        assert!(trade.sell_order_id.is_none());
        assert!(trade.actual_profit.is_none());
        assert!(trade.error.as_deref().unwrap().contains("sell leg failed"));
    }

    #[tokio::test]
    async fn test_buy_leg_failure_is_partial_on_sell() {
        let (alpha, beta) = connected_pair().await;
        alpha.script_fill(
            Side::Buy,
            Err(BrokerError::Timeout {
                broker: "alpha".to_string(),
            }),
        );
        beta.script_fill_at(Side::Sell, px(1.10545));
        let executor = executor(&alpha, &beta);

        let trade = executor.execute(&opportunity()).await.unwrap();
        assert_eq!(
            trade.status,
            TradeStatus::PartiallyExecuted {
                filled_leg: Side::Sell
            }
        );
        assert!(trade.sell_order_id.is_some());
        assert!(trade.error.as_deref().unwrap().contains("buy leg failed"));
    }

    #[tokio::test]
    async fn test_both_legs_failing_is_failed() {
        let (alpha, beta) = connected_pair().await;
        alpha.script_fill(
            Side::Buy,
            Err(BrokerError::Rejected {
                broker: "alpha".to_string(),
                reason: "margin".to_string(),
            }),
        );
        beta.script_fill(
            Side::Sell,
            Err(BrokerError::Rejected {
                broker: "beta".to_string(),
                reason: "margin".to_string(),
            }),
        );
        let executor = executor(&alpha, &beta);

        let trade = executor.execute(&opportunity()).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Failed);
        let error = trade.error.unwrap();
        assert!(error.contains("buy leg failed"));
        assert!(error.contains("sell leg failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_timeout_releases_claim() {
        let (alpha, beta) = connected_pair().await;
        alpha.push_quote(eur_usd(), px(1.10500), px(1.10510));
        beta.push_quote(eur_usd(), px(1.10550), px(1.10560));
        alpha.set_order_latency(Duration::from_millis(200));
        let executor = TradeExecutor::new(
            vec![alpha.clone() as Arc<dyn Broker>, beta.clone() as Arc<dyn Broker>],
            Duration::from_millis(50),
        );

        let opp = opportunity();
        let trade = executor.execute(&opp).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Failed);
        assert!(trade.error.as_deref().unwrap().contains("timed out"));

        // Claim released: a fresh attempt goes through once the broker is fast
        alpha.set_order_latency(Duration::ZERO);
        let trade = executor.execute(&opp).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Completed);
    }

    #[tokio::test]
    async fn test_profit_summary_completed_only() {
        let (alpha, beta) = connected_pair().await;
        let executor = executor(&alpha, &beta);

        // Winner: +3.3
        alpha.script_fill_at(Side::Buy, px(1.10512));
        beta.script_fill_at(Side::Sell, px(1.10545));
        executor.execute(&opportunity()).await.unwrap();

        // Loser: buy above sell, -1.0
        alpha.script_fill_at(Side::Buy, px(1.10560));
        beta.script_fill_at(Side::Sell, px(1.10550));
        executor.execute(&opportunity()).await.unwrap();

        // Failed attempt: excluded from aggregation
        alpha.script_fill(
            Side::Buy,
            Err(BrokerError::Rejected {
                broker: "alpha".to_string(),
                reason: "margin".to_string(),
            }),
        );
        beta.script_fill(
            Side::Sell,
            Err(BrokerError::Rejected {
                broker: "beta".to_string(),
                reason: "margin".to_string(),
            }),
        );
        executor.execute(&opportunity()).await.unwrap();

        let summary = executor.profit_summary().await;
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.profitable_trades, 1);
        assert_eq!(summary.unprofitable_trades, 1);
        assert_eq!(summary.total_profit, px(2.3));
        assert_eq!(summary.average_profit, px(1.15));
        assert_eq!(executor.trade_history().await.len(), 3);
    }
}
