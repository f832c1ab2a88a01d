use crate::store::EntryCriteriaStore;
use anyhow::{Context, Result};
use broker_trait::BrokerClient;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use trading_core::{PortfolioState, Position};

pub struct PortfolioManager {
    broker: Arc<dyn BrokerClient>,
    entry_criteria: EntryCriteriaStore,
}

impl PortfolioManager {
    pub fn new(broker: Arc<dyn BrokerClient>, entry_criteria: EntryCriteriaStore) -> Self {
        Self {
            broker,
            entry_criteria,
        }
    }

    pub fn entry_criteria_store(&self) -> &EntryCriteriaStore {
        &self.entry_criteria
    }

    /// Pull account + positions from the broker and compute today's trade
    /// count. Any broker failure here should be treated as fatal by the
    /// caller; there is no cached fallback for account state.
    pub async fn get_portfolio_state(&self) -> Result<PortfolioState> {
        let account = self
            .broker
            .get_account()
            .await
            .context("fetching account")?;
        let broker_positions = self
            .broker
            .get_positions()
            .await
            .context("fetching positions")?;
        let criteria = self.entry_criteria.load();

        let positions = broker_positions
            .into_iter()
            .map(|p| {
                let qty = p.qty_decimal().to_f64().unwrap_or(0.0);
                Position {
                    entry_criteria: criteria.get(&p.symbol).cloned(),
                    symbol: p.symbol,
                    qty,
                    avg_entry_price: p.avg_entry_price_decimal().to_f64().unwrap_or(0.0),
                    market_value: p.market_value_decimal().to_f64().unwrap_or(0.0),
                    unrealized_pl: p.unrealized_pl_decimal().to_f64().unwrap_or(0.0),
                    unrealized_plpc: p.unrealized_plpc.parse().unwrap_or(0.0),
                }
            })
            .collect();

        let trades_today = self.count_trades_today().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not count trades today, assuming 0");
            0
        });

        let equity = account.portfolio_value_decimal().to_f64().unwrap_or(0.0);

        Ok(PortfolioState {
            equity,
            cash: account.cash_decimal().to_f64().unwrap_or(0.0),
            buying_power: account.buying_power_decimal().to_f64().unwrap_or(0.0),
            positions,
            open_order_count: 0,
            trades_today,
            pnl_day: 0.0,
        })
    }

    /// Count filled orders since UTC midnight. Anchored to UTC (not local
    /// time) so it matches the UTC-dated grouping the observability store
    /// uses for its own daily files.
    async fn count_trades_today(&self) -> Result<usize> {
        let today_start = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let orders = self.broker.get_orders(Some(200)).await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.status == "filled")
            .filter(|o| o.filled_at.map(|t| t >= today_start).unwrap_or(false))
            .count())
    }

    pub fn save_entry_criteria(
        &self,
        symbol: &str,
        criteria: trading_core::EntryCriteria,
    ) -> Result<()> {
        self.entry_criteria.save(symbol, criteria)
    }

    pub fn clear_entry_criteria(&self, symbol: &str) -> Result<()> {
        self.entry_criteria.clear(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_trait::*;

    struct StubBroker;

    #[async_trait]
    impl BrokerClient for StubBroker {
        async fn get_account(&self) -> Result<BrokerAccount> {
            Ok(BrokerAccount {
                id: "acct".into(),
                account_number: "123".into(),
                status: "ACTIVE".into(),
                currency: "USD".into(),
                buying_power: "10000".into(),
                cash: "5000".into(),
                portfolio_value: "15000".into(),
                pattern_day_trader: false,
                trading_blocked: false,
                daytrade_count: 0,
            })
        }
        async fn get_positions(&self) -> Result<Vec<BrokerPosition>> {
            Ok(vec![])
        }
        async fn get_position(&self, _symbol: &str) -> Result<Option<BrokerPosition>> {
            Ok(None)
        }
        async fn submit_market_order(&self, _order: BrokerOrderRequest) -> Result<BrokerOrder> {
            unimplemented!()
        }
        async fn submit_notional_order(
            &self,
            _order: BrokerOrderRequestNotional,
        ) -> Result<BrokerOrder> {
            unimplemented!()
        }
        async fn get_bars(&self, _symbol: &str, _limit: usize) -> Result<Vec<BrokerBar>> {
            Ok(vec![])
        }
        async fn get_latest_quote(&self, _symbol: &str) -> Result<BrokerQuote> {
            unimplemented!()
        }
        async fn get_clock(&self) -> Result<BrokerClock> {
            unimplemented!()
        }
        async fn get_order(&self, _order_id: &str) -> Result<BrokerOrder> {
            unimplemented!()
        }
        async fn get_orders(&self, _limit: Option<usize>) -> Result<Vec<BrokerOrder>> {
            Ok(vec![])
        }
        async fn cancel_order(&self, _order_id: &str) -> Result<()> {
            Ok(())
        }
        async fn close_position(&self, _symbol: &str) -> Result<BrokerOrder> {
            unimplemented!()
        }
        fn is_paper(&self) -> bool {
            true
        }
        fn broker_name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn portfolio_state_reflects_account_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryCriteriaStore::new(dir.path().join("entry_criteria.json"));
        let manager = PortfolioManager::new(Arc::new(StubBroker), store);

        let state = manager.get_portfolio_state().await.unwrap();
        assert_eq!(state.equity, 15000.0);
        assert_eq!(state.cash, 5000.0);
        assert_eq!(state.trades_today, 0);
    }
}
