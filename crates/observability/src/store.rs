use crate::csv_log;
use crate::paths;
use std::fs::File;
use std::path::PathBuf;
use trading_core::{Decision, LoopResult};

pub struct ObservabilityStore {
    log_dir: PathBuf,
}

impl ObservabilityStore {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Persist one completed loop. Never propagates a failure to the caller:
    /// a broken log directory should not stop the trading loop, only get
    /// logged as a warning.
    pub fn record_loop(&self, result: &LoopResult) {
        if let Err(e) = self.write_loop_file(result) {
            tracing::warn!(error = %e, "failed to write loop artifact");
        }
        if let Err(e) = self.append_decision_csv(result) {
            tracing::warn!(error = %e, "failed to append decisions.csv");
        }
        if let Err(e) = self.append_trade_if_any(result) {
            tracing::warn!(error = %e, "failed to append trade record");
        }
        if let Err(e) = self.append_equity(result) {
            tracing::warn!(error = %e, "failed to append equity record");
        }

        let (decision_kind, status) = match &result.decision {
            Decision::Trade(t) => ("trade", t.side.as_str()),
            Decision::NoTrade(_) => ("no_trade", "-"),
        };
        tracing::info!(
            loop_id = %result.loop_id,
            signals = result.signals.len(),
            decision = decision_kind,
            side = status,
            risk_allowed = result.risk_result.as_ref().map(|r| r.allowed),
            order_status = result.order_result.as_ref().map(|o| o.status.as_str()),
            duration_ms = result.duration_ms,
            "loop complete"
        );
    }

    fn write_loop_file(&self, result: &LoopResult) -> anyhow::Result<()> {
        let dir = paths::loops_dir(&self.log_dir);
        std::fs::create_dir_all(&dir)?;
        let path = paths::loop_file(&self.log_dir, result.loop_id, result.timestamp);
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, result)?;
        Ok(())
    }

    fn append_decision_csv(&self, result: &LoopResult) -> anyhow::Result<()> {
        let (action, symbol, notional, reason) = match &result.decision {
            Decision::Trade(t) => ("trade", t.symbol.clone(), t.notional_usd.to_string(), t.thesis.summary.clone()),
            Decision::NoTrade(nt) => ("no_trade", String::new(), String::new(), nt.reason.clone()),
        };
        csv_log::append_row(
            &paths::decisions_csv(&self.log_dir),
            &["ts", "loop_id", "action", "symbol", "notional_usd", "risk_allowed", "reason"],
            &[
                result.timestamp.to_rfc3339(),
                result.loop_id.to_string(),
                action.to_string(),
                symbol,
                notional,
                result
                    .risk_result
                    .as_ref()
                    .map(|r| r.allowed.to_string())
                    .unwrap_or_default(),
                reason,
            ],
        )
    }

    fn append_trade_if_any(&self, result: &LoopResult) -> anyhow::Result<()> {
        let Decision::Trade(trade) = &result.decision else {
            return Ok(());
        };
        let Some(order) = &result.order_result else {
            return Ok(());
        };

        let record = serde_json::json!({
            "ts": result.timestamp.to_rfc3339(),
            "loop_id": result.loop_id,
            "symbol": trade.symbol,
            "side": trade.side,
            "notional_usd": trade.notional_usd,
            "is_exit": trade.is_exit(),
            "thesis": trade.thesis.summary,
            "order_status": order.status,
            "broker_order_id": order.broker_order_id,
        });

        let dir = paths::trades_dir(&self.log_dir);
        std::fs::create_dir_all(&dir)?;
        append_jsonl(&paths::trades_file(&self.log_dir, result.timestamp), &record)?;

        csv_log::append_row(
            &paths::trades_csv(&self.log_dir),
            &["ts", "symbol", "side", "notional_usd", "status", "order_id"],
            &[
                result.timestamp.to_rfc3339(),
                trade.symbol.clone(),
                trade.side.clone(),
                trade.notional_usd.to_string(),
                order.status.clone(),
                order.broker_order_id.clone().unwrap_or_default(),
            ],
        )
    }

    fn append_equity(&self, result: &LoopResult) -> anyhow::Result<()> {
        let Some(portfolio) = &result.portfolio else {
            return Ok(());
        };

        let record = serde_json::json!({
            "ts": result.timestamp.to_rfc3339(),
            "equity": portfolio.equity,
            "cash": portfolio.cash,
            "buying_power": portfolio.buying_power,
            "open_positions": portfolio.positions.len(),
            "pnl_day": portfolio.pnl_day,
        });

        let dir = paths::equity_dir(&self.log_dir);
        std::fs::create_dir_all(&dir)?;
        append_jsonl(&paths::equity_file(&self.log_dir, result.timestamp), &record)?;

        csv_log::append_row(
            &paths::equity_csv(&self.log_dir),
            &["ts", "equity", "cash", "buying_power", "pnl_day"],
            &[
                result.timestamp.to_rfc3339(),
                portfolio.equity.to_string(),
                portfolio.cash.to_string(),
                portfolio.buying_power.to_string(),
                portfolio.pnl_day.to_string(),
            ],
        )
    }
}

fn append_jsonl(path: &std::path::Path, value: &serde_json::Value) -> anyhow::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", serde_json::to_string(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::{
        MarketSnapshot, OrderResult, PortfolioState, Signal, SignalDirection, Thesis,
        TradeIntent, TurtleSystem,
    };

    fn sample_trade_result() -> LoopResult {
        let signal = Signal {
            symbol: "SPY".into(),
            direction: SignalDirection::Long,
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
        let trade = TradeIntent {
            symbol: "SPY".into(),
            side: "buy".into(),
            notional_usd: 25.0,
            stop_price: 446.0,
            exit_trigger: 440.0,
            thesis: Thesis {
                summary: "breakout".into(),
                system: Some(TurtleSystem::S2),
                breakout_days: None,
                atr_n: Some(5.0),
                stop_n: None,
                signal_score: None,
                portfolio_fit: None,
                regime: None,
            },
            confidence: 0.7,
            signal,
        };

        let mut result = LoopResult::new(MarketSnapshot::empty(), Decision::Trade(trade));
        result.portfolio = Some(PortfolioState {
            equity: 100_000.0,
            cash: 99_975.0,
            buying_power: 99_975.0,
            positions: vec![],
            open_order_count: 1,
            trades_today: 1,
            pnl_day: 0.0,
        });
        result.order_result = Some(OrderResult {
            broker_order_id: Some("order-1".into()),
            status: "accepted".into(),
            message: "order submitted".into(),
            filled_qty: None,
            filled_avg_price: None,
        });
        result
    }

    #[test]
    fn record_loop_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObservabilityStore::new(dir.path());
        let result = sample_trade_result();

        store.record_loop(&result);

        assert!(paths::decisions_csv(dir.path()).exists());
        assert!(paths::trades_csv(dir.path()).exists());
        assert!(paths::equity_csv(dir.path()).exists());
        assert!(paths::trades_file(dir.path(), result.timestamp).exists());
        assert!(paths::equity_file(dir.path(), result.timestamp).exists());

        let loop_files: Vec<_> = std::fs::read_dir(paths::loops_dir(dir.path()))
            .unwrap()
            .collect();
        assert_eq!(loop_files.len(), 1);
    }

    #[test]
    fn no_trade_decision_skips_trades_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObservabilityStore::new(dir.path());
        let result = LoopResult::new(
            MarketSnapshot::empty(),
            Decision::no_trade("No signals generated"),
        );

        store.record_loop(&result);

        assert!(paths::decisions_csv(dir.path()).exists());
        assert!(!paths::trades_csv(dir.path()).exists());
    }
}
