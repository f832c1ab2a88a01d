//! Fetches daily bars and latest quotes for the configured symbol universe,
//! isolating per-symbol failures so one bad ticker never blanks a whole tick.

use broker_trait::BrokerClient;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use trading_core::{Bar, MarketSnapshot, Quote, SymbolData};

pub struct MarketDataClient {
    broker: Arc<dyn BrokerClient>,
    lookback_bars: usize,
}

impl MarketDataClient {
    pub fn new(broker: Arc<dyn BrokerClient>, lookback_bars: usize) -> Self {
        Self {
            broker,
            lookback_bars,
        }
    }

    /// Build a MarketSnapshot for `symbols`. Per-symbol fetch failures are
    /// recorded in `errors` and do not prevent other symbols from loading.
    /// `data_available` is false only if every symbol failed.
    pub async fn fetch_snapshot(&self, symbols: &[String]) -> MarketSnapshot {
        let mut snapshot_symbols = HashMap::new();
        let mut errors = Vec::new();

        for symbol in symbols {
            match self.fetch_symbol_data(symbol).await {
                Ok(data) => {
                    snapshot_symbols.insert(symbol.clone(), data);
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "failed to fetch symbol data");
                    errors.push(format!("{}: {}", symbol, e));
                }
            }
        }

        let is_market_open = match self.broker.get_clock().await {
            Ok(clock) => clock.is_open,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch market clock, assuming closed");
                false
            }
        };

        let data_available = !snapshot_symbols.is_empty();

        MarketSnapshot {
            timestamp: Utc::now(),
            symbols: snapshot_symbols,
            is_market_open,
            data_available,
            errors,
        }
    }

    async fn fetch_symbol_data(&self, symbol: &str) -> anyhow::Result<SymbolData> {
        let bars = self.broker.get_bars(symbol, self.lookback_bars).await?;
        let bars: Vec<Bar> = bars
            .into_iter()
            .map(|b| Bar {
                timestamp: b.timestamp,
                open: b.open.to_f64().unwrap_or(0.0),
                high: b.high.to_f64().unwrap_or(0.0),
                low: b.low.to_f64().unwrap_or(0.0),
                close: b.close.to_f64().unwrap_or(0.0),
                volume: b.volume,
            })
            .collect();

        if bars.is_empty() {
            anyhow::bail!("no bars returned");
        }

        // A missing quote isn't fatal — bars alone are enough to compute
        // channels and ATR, just not to check for a live breakout this tick.
        let quote = match self.broker.get_latest_quote(symbol).await {
            Ok(q) => Some(Quote {
                bid: q.bid.to_f64().unwrap_or(0.0),
                ask: q.ask.to_f64().unwrap_or(0.0),
                last: q.last.to_f64().unwrap_or(0.0),
                timestamp: q.timestamp,
            }),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "failed to fetch quote");
                None
            }
        };

        Ok(SymbolData::new(symbol, bars, quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_trait::*;

    struct FlakyBroker;

    #[async_trait]
    impl BrokerClient for FlakyBroker {
        async fn get_account(&self) -> anyhow::Result<BrokerAccount> {
            unimplemented!()
        }
        async fn get_positions(&self) -> anyhow::Result<Vec<BrokerPosition>> {
            unimplemented!()
        }
        async fn get_position(&self, _symbol: &str) -> anyhow::Result<Option<BrokerPosition>> {
            unimplemented!()
        }
        async fn submit_market_order(&self, _order: BrokerOrderRequest) -> anyhow::Result<BrokerOrder> {
            unimplemented!()
        }
        async fn submit_notional_order(
            &self,
            _order: BrokerOrderRequestNotional,
        ) -> anyhow::Result<BrokerOrder> {
            unimplemented!()
        }
        async fn get_bars(&self, symbol: &str, _limit: usize) -> anyhow::Result<Vec<BrokerBar>> {
            if symbol == "BAD" {
                anyhow::bail!("simulated fetch failure");
            }
            Ok(vec![BrokerBar {
                timestamp: Utc::now(),
                open: 1.into(),
                high: 2.into(),
                low: 1.into(),
                close: 1.into(),
                volume: 100,
            }])
        }
        async fn get_latest_quote(&self, _symbol: &str) -> anyhow::Result<BrokerQuote> {
            Ok(BrokerQuote {
                symbol: "SPY".into(),
                bid: 1.into(),
                ask: 1.into(),
                last: 1.into(),
                timestamp: Utc::now(),
            })
        }
        async fn get_clock(&self) -> anyhow::Result<BrokerClock> {
            Ok(BrokerClock {
                timestamp: Utc::now(),
                is_open: true,
                next_open: Utc::now(),
                next_close: Utc::now(),
            })
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
            "flaky"
        }
    }

    #[tokio::test]
    async fn one_bad_symbol_does_not_poison_the_snapshot() {
        let client = MarketDataClient::new(Arc::new(FlakyBroker), 60);
        let snapshot = client
            .fetch_snapshot(&["SPY".to_string(), "BAD".to_string()])
            .await;
        assert!(snapshot.data_available);
        assert!(snapshot.symbols.contains_key("SPY"));
        assert!(!snapshot.symbols.contains_key("BAD"));
        assert_eq!(snapshot.errors.len(), 1);
    }

    #[tokio::test]
    async fn all_symbols_failing_marks_data_unavailable() {
        let client = MarketDataClient::new(Arc::new(FlakyBroker), 60);
        let snapshot = client.fetch_snapshot(&["BAD".to_string()]).await;
        assert!(!snapshot.data_available);
    }
}
