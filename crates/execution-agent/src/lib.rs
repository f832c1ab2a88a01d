pub mod config;
pub mod execute;
pub mod pending;

pub use config::{AutonomyTier, ExecutionConfig, TradingMode};
pub use execute::ExecutionAgent;
pub use pending::PendingTradeStore;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_trait::*;
    use std::sync::Arc;
    use trading_core::{
        Decision, PortfolioState, RiskResult, Signal, SignalDirection, Thesis, TradeIntent,
        TurtleSystem,
    };

    struct StubBroker {
        order_status: &'static str,
    }

    #[async_trait]
    impl BrokerClient for StubBroker {
        async fn get_account(&self) -> anyhow::Result<BrokerAccount> {
            unimplemented!()
        }
        async fn get_positions(&self) -> anyhow::Result<Vec<BrokerPosition>> {
            unimplemented!()
        }
        async fn get_position(&self, _symbol: &str) -> anyhow::Result<Option<BrokerPosition>> {
            unimplemented!()
        }
        async fn submit_market_order(
            &self,
            _order: BrokerOrderRequest,
        ) -> anyhow::Result<BrokerOrder> {
            unimplemented!()
        }
        async fn submit_notional_order(
            &self,
            order: BrokerOrderRequestNotional,
        ) -> anyhow::Result<BrokerOrder> {
            Ok(BrokerOrder {
                id: "order-1".into(),
                client_order_id: "client-1".into(),
                created_at: chrono::Utc::now(),
                filled_at: None,
                symbol: order.symbol,
                qty: None,
                filled_qty: None,
                filled_avg_price: None,
                order_type: "market".into(),
                side: "buy".into(),
                status: self.order_status.to_string(),
            })
        }
        async fn get_bars(&self, _symbol: &str, _limit: usize) -> anyhow::Result<Vec<BrokerBar>> {
            unimplemented!()
        }
        async fn get_latest_quote(&self, _symbol: &str) -> anyhow::Result<BrokerQuote> {
            unimplemented!()
        }
        async fn get_clock(&self) -> anyhow::Result<BrokerClock> {
            unimplemented!()
        }
        async fn get_order(&self, _order_id: &str) -> anyhow::Result<BrokerOrder> {
            unimplemented!()
        }
        async fn get_orders(&self, _limit: Option<usize>) -> anyhow::Result<Vec<BrokerOrder>> {
            unimplemented!()
        }
        async fn cancel_order(&self, _order_id: &str) -> anyhow::Result<()> {
            unimplemented!()
        }
        async fn close_position(&self, _symbol: &str) -> anyhow::Result<BrokerOrder> {
            unimplemented!()
        }
        fn is_paper(&self) -> bool {
            true
        }
        fn broker_name(&self) -> &str {
            "stub"
        }
    }

    fn trade_intent(is_exit: bool, stop_loss_wording: bool) -> TradeIntent {
        let direction = if is_exit {
            SignalDirection::ExitLong
        } else {
            SignalDirection::Long
        };
        let signal = Signal {
            symbol: "SPY".into(),
            direction,
            system: TurtleSystem::S2,
            entry_ref: 450.0,
            current_price: 456.0,
            atr_n: 5.0,
            stop_price: 446.0,
            exit_ref: 440.0,
            score_hint: 0.7,
            reason: "breakout".into(),
            volume_confirmed: None,
            trend_aligned: None,
            filters_passed: true,
            filter_notes: vec![],
        };
        TradeIntent {
            symbol: "SPY".into(),
            side: if is_exit { "sell" } else { "buy" }.into(),
            notional_usd: 25.0,
            stop_price: 446.0,
            exit_trigger: 440.0,
            thesis: Thesis {
                summary: if stop_loss_wording {
                    "STOP LOSS hit".into()
                } else {
                    "system exit".into()
                },
                system: Some(TurtleSystem::S2),
                breakout_days: None,
                atr_n: Some(5.0),
                stop_n: None,
                signal_score: None,
                portfolio_fit: None,
                regime: None,
            },
            confidence: 0.9,
            signal,
        }
    }

    fn portfolio() -> PortfolioState {
        PortfolioState {
            equity: 100_000.0,
            cash: 100_000.0,
            buying_power: 100_000.0,
            positions: vec![],
            open_order_count: 0,
            trades_today: 0,
            pnl_day: 0.0,
        }
    }

    fn risk_result(trade: TradeIntent) -> RiskResult {
        RiskResult {
            allowed: true,
            notes: vec![],
            violations: vec![],
            original_decision: Decision::Trade(trade.clone()),
            final_decision: Decision::Trade(trade),
        }
    }

    fn agent_with_tier(tier: AutonomyTier) -> ExecutionAgent {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(StubBroker {
            order_status: "accepted",
        });
        let cfg = ExecutionConfig {
            trading_mode: TradingMode::Paper,
            autonomy_tier: tier,
            live_trading_enabled: false,
        };
        let pending = PendingTradeStore::new(dir.path().join("pending_trades.json"));
        ExecutionAgent::new(broker, cfg, pending)
    }

    #[tokio::test]
    async fn full_agentic_always_auto_executes() {
        let agent = agent_with_tier(AutonomyTier::FullAgentic);
        let (result, pending) = agent
            .execute(risk_result(trade_intent(false, false)), &portfolio())
            .await;
        assert_eq!(result.status, "accepted");
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn manual_tier_always_queues() {
        let agent = agent_with_tier(AutonomyTier::Manual);
        let (result, pending) = agent
            .execute(risk_result(trade_intent(true, true)), &portfolio())
            .await;
        assert_eq!(result.status, "queued_for_approval");
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn moderate_tier_auto_executes_stop_loss_exits_only() {
        let agent = agent_with_tier(AutonomyTier::Moderate);

        let (stop_loss_result, _) = agent
            .execute(risk_result(trade_intent(true, true)), &portfolio())
            .await;
        assert_eq!(stop_loss_result.status, "accepted");

        let (system_exit_result, pending) = agent
            .execute(risk_result(trade_intent(true, false)), &portfolio())
            .await;
        assert_eq!(system_exit_result.status, "queued_for_approval");
        assert!(pending.is_some());
    }

    #[tokio::test]
    async fn blocked_risk_result_never_reaches_broker() {
        let agent = agent_with_tier(AutonomyTier::FullAgentic);
        let mut blocked = risk_result(trade_intent(false, false));
        blocked.allowed = false;
        blocked.violations = vec!["daily loss cap".into()];

        let (result, pending) = agent.execute(blocked, &portfolio()).await;
        assert_eq!(result.status, "blocked");
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn approve_expired_pending_trade_is_rejected() {
        let agent = agent_with_tier(AutonomyTier::Manual);
        let (_, pending) = agent
            .execute(risk_result(trade_intent(false, false)), &portfolio())
            .await;
        let mut pending = pending.unwrap();
        pending.expires_at = chrono::Utc::now() - chrono::Duration::hours(1);
        agent.pending_store().update(pending.clone()).unwrap();

        let result = agent.approve(pending.id).await;
        assert_eq!(result.status, "expired");
    }

    #[tokio::test]
    async fn reject_marks_pending_trade_rejected() {
        let agent = agent_with_tier(AutonomyTier::Manual);
        let (_, pending) = agent
            .execute(risk_result(trade_intent(false, false)), &portfolio())
            .await;
        let pending = pending.unwrap();

        assert!(agent.reject(pending.id, "thesis no longer holds"));

        let reloaded = agent.pending_store().get(pending.id).unwrap();
        assert_eq!(reloaded.status, trading_core::PendingTradeStatus::Rejected);
        assert_eq!(
            reloaded.decision_note.as_deref(),
            Some("thesis no longer holds")
        );
    }
}
