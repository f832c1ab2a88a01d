use crate::config::{AutonomyTier, ExecutionConfig, TradingMode};
use crate::pending::PendingTradeStore;
use broker_trait::{BrokerClient, BrokerOrderRequestNotional, BrokerOrderSide};
use chrono::{Duration, Utc};
use rust_decimal::prelude::*;
use std::sync::Arc;
use trading_core::{
    Decision, OrderResult, PendingTrade, PendingTradeStatus, PortfolioState, RiskResult,
    TradeIntent,
};
use uuid::Uuid;

const PENDING_TTL_HOURS: i64 = 4;

pub struct ExecutionAgent {
    broker: Arc<dyn BrokerClient>,
    cfg: ExecutionConfig,
    pending: PendingTradeStore,
}

impl ExecutionAgent {
    pub fn new(broker: Arc<dyn BrokerClient>, cfg: ExecutionConfig, pending: PendingTradeStore) -> Self {
        Self {
            broker,
            cfg,
            pending,
        }
    }

    pub fn pending_store(&self) -> &PendingTradeStore {
        &self.pending
    }

    /// Execute, queue, or reject a risk-gated decision. Returns the result
    /// alongside any pending trade created for later approval. `portfolio`
    /// is the snapshot the decision was made against, stored with any
    /// resulting pending trade for the approval UI to display.
    pub async fn execute(
        &self,
        risk_result: RiskResult,
        portfolio: &PortfolioState,
    ) -> (OrderResult, Option<PendingTrade>) {
        if !risk_result.allowed {
            return (
                OrderResult::blocked(format!(
                    "Risk gate blocked: {}",
                    risk_result.violations.join("; ")
                )),
                None,
            );
        }

        let trade = match &risk_result.final_decision {
            Decision::NoTrade(nt) => {
                return (OrderResult::skipped(nt.reason.clone()), None);
            }
            Decision::Trade(t) => t.clone(),
        };

        if !self.cfg.can_execute_orders() {
            return (
                OrderResult {
                    broker_order_id: None,
                    status: "shadow_mode".to_string(),
                    message: "Shadow mode - trade logged but not executed".to_string(),
                    filled_qty: None,
                    filled_avg_price: None,
                },
                None,
            );
        }

        if self.cfg.trading_mode == TradingMode::Live && !self.cfg.live_trading_enabled {
            return (
                OrderResult {
                    broker_order_id: None,
                    status: "live_blocked".to_string(),
                    message: "Live trading is disabled for this deployment".to_string(),
                    filled_qty: None,
                    filled_avg_price: None,
                },
                None,
            );
        }

        if self.should_auto_execute(&trade) {
            (self.place_order(&trade).await, None)
        } else {
            match self.queue_for_approval(trade.clone(), risk_result, portfolio.clone()) {
                Ok(pending) => (
                    OrderResult {
                        broker_order_id: None,
                        status: "queued_for_approval".to_string(),
                        message: format!(
                            "Trade queued for manual approval (autonomy: {:?})",
                            self.cfg.autonomy_tier
                        ),
                        filled_qty: None,
                        filled_avg_price: None,
                    },
                    Some(pending),
                ),
                Err(e) => (
                    OrderResult {
                        broker_order_id: None,
                        status: "error".to_string(),
                        message: format!("failed to queue trade: {e}"),
                        filled_qty: None,
                        filled_avg_price: None,
                    },
                    None,
                ),
            }
        }
    }

    fn should_auto_execute(&self, trade: &TradeIntent) -> bool {
        match self.cfg.autonomy_tier {
            AutonomyTier::FullAgentic => true,
            AutonomyTier::Moderate => {
                trade.is_exit() && trade.thesis.summary.to_uppercase().contains("STOP LOSS")
            }
            AutonomyTier::Manual => false,
        }
    }

    async fn place_order(&self, trade: &TradeIntent) -> OrderResult {
        let side = if trade.side == "buy" {
            BrokerOrderSide::Buy
        } else {
            BrokerOrderSide::Sell
        };
        let notional = Decimal::try_from(trade.notional_usd).unwrap_or_default();

        let request = BrokerOrderRequestNotional {
            symbol: trade.symbol.clone(),
            notional,
            side,
        };

        match self.broker.submit_notional_order(request).await {
            Ok(order) => {
                tracing::info!(
                    symbol = %trade.symbol,
                    side = %trade.side,
                    notional = trade.notional_usd,
                    order_id = %order.id,
                    "order placed"
                );
                OrderResult {
                    broker_order_id: Some(order.id),
                    status: order.status,
                    message: "order submitted".to_string(),
                    filled_qty: order.filled_quantity_decimal().and_then(|d| d.to_f64()),
                    filled_avg_price: order.filled_avg_price_decimal().and_then(|d| d.to_f64()),
                }
            }
            Err(e) => {
                tracing::error!(symbol = %trade.symbol, error = %e, "order failed");
                OrderResult {
                    broker_order_id: None,
                    status: "error".to_string(),
                    message: format!("order failed: {e}"),
                    filled_qty: None,
                    filled_avg_price: None,
                }
            }
        }
    }

    fn queue_for_approval(
        &self,
        trade: TradeIntent,
        risk_result: RiskResult,
        portfolio_snapshot: PortfolioState,
    ) -> anyhow::Result<PendingTrade> {
        let pending = PendingTrade {
            id: Uuid::new_v4(),
            intent: trade,
            portfolio_snapshot,
            risk_result,
            status: PendingTradeStatus::Pending,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(PENDING_TTL_HOURS),
            decided_at: None,
            decision_note: None,
            execution: None,
        };
        self.pending.insert(pending.clone())?;
        tracing::info!(id = %pending.id, symbol = %pending.intent.symbol, "trade queued for approval");
        Ok(pending)
    }

    pub async fn approve(&self, id: Uuid) -> OrderResult {
        let Some(mut pending) = self.pending.get(id) else {
            return OrderResult {
                broker_order_id: None,
                status: "not_found".to_string(),
                message: format!("trade {id} not found"),
                filled_qty: None,
                filled_avg_price: None,
            };
        };

        if pending.status != PendingTradeStatus::Pending {
            return OrderResult {
                broker_order_id: None,
                status: "invalid_state".to_string(),
                message: format!("trade is {:?}, not pending", pending.status),
                filled_qty: None,
                filled_avg_price: None,
            };
        }

        if pending.is_expired(Utc::now()) {
            pending.status = PendingTradeStatus::Expired;
            let _ = self.pending.update(pending);
            return OrderResult {
                broker_order_id: None,
                status: "expired".to_string(),
                message: "trade has expired".to_string(),
                filled_qty: None,
                filled_avg_price: None,
            };
        }

        let result = self.place_order(&pending.intent).await;
        pending.status = if result.status == "error" {
            PendingTradeStatus::Rejected
        } else {
            PendingTradeStatus::Executed
        };
        pending.decided_at = Some(Utc::now());
        pending.execution = Some(result.clone());
        let _ = self.pending.update(pending);

        result
    }

    pub fn reject(&self, id: Uuid, reason: &str) -> bool {
        let Some(mut pending) = self.pending.get(id) else {
            return false;
        };
        pending.status = PendingTradeStatus::Rejected;
        pending.decided_at = Some(Utc::now());
        pending.decision_note = Some(reason.to_string());
        let _ = self.pending.update(pending);
        tracing::info!(%id, reason, "trade rejected");
        true
    }
}
