//! Runs one tick end to end: fetch data, generate and score signals, decide,
//! gate, size, execute, persist. See the module-level ordering comment on
//! `Orchestrator::run_tick` for the exact sequence — it must not be reordered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use circuit_breaker::DrawdownCircuitBreaker;
use decision_agent::DecisionAgent;
use execution_agent::{ExecutionAgent, TradingMode};
use kelly_position_sizer::TradeHistorySizer;
use market_data_client::MarketDataClient;
use observability::ObservabilityStore;
use portfolio_manager::PortfolioManager;
use research_client::ResearchHook;
use risk_manager::RiskConfig;
use signal_generator::FilterConfig;
use trading_core::{
    Decision, EntryCriteria, LoopResult, PortfolioState, ResearchInsight, TradeRecord,
};

pub struct Orchestrator {
    symbols: Vec<String>,
    market_data: MarketDataClient,
    portfolio: Arc<PortfolioManager>,
    decision: DecisionAgent,
    research: Option<ResearchHook>,
    research_score_threshold: f64,
    risk_cfg: RiskConfig,
    sizer: TradeHistorySizer,
    breaker: DrawdownCircuitBreaker,
    execution: Arc<ExecutionAgent>,
    store: ObservabilityStore,
    filter_cfg: FilterConfig,
    trading_mode: TradingMode,
    last_rollover_day: Mutex<Option<NaiveDate>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbols: Vec<String>,
        market_data: MarketDataClient,
        portfolio: Arc<PortfolioManager>,
        decision: DecisionAgent,
        research: Option<ResearchHook>,
        research_score_threshold: f64,
        risk_cfg: RiskConfig,
        sizer: TradeHistorySizer,
        breaker: DrawdownCircuitBreaker,
        execution: Arc<ExecutionAgent>,
        store: ObservabilityStore,
        filter_cfg: FilterConfig,
        trading_mode: TradingMode,
    ) -> Self {
        Self {
            symbols,
            market_data,
            portfolio,
            decision,
            research,
            research_score_threshold,
            risk_cfg,
            sizer,
            breaker,
            execution,
            store,
            filter_cfg,
            trading_mode,
            last_rollover_day: Mutex::new(None),
        }
    }

    pub async fn run_tick(&self) -> LoopResult {
        let started = std::time::Instant::now();

        // 1. Fetch snapshot.
        let snapshot = self.market_data.fetch_snapshot(&self.symbols).await;
        if !snapshot.data_available {
            let mut result =
                LoopResult::new(snapshot, Decision::no_trade("DATA_UNAVAILABLE"));
            result.duration_ms = started.elapsed().as_millis() as u64;
            self.store.record_loop(&result);
            return result;
        }

        // 2. Read portfolio.
        let portfolio = match self.portfolio.get_portfolio_state().await {
            Ok(p) => p,
            Err(e) if self.trading_mode == TradingMode::Shadow => {
                tracing::warn!(error = %e, "portfolio unavailable in shadow mode, synthesizing empty portfolio");
                empty_portfolio()
            }
            Err(e) => {
                tracing::warn!(error = %e, "portfolio unavailable");
                let mut result =
                    LoopResult::new(snapshot, Decision::no_trade("PORTFOLIO_UNAVAILABLE"));
                result.duration_ms = started.elapsed().as_millis() as u64;
                self.store.record_loop(&result);
                return result;
            }
        };

        self.maybe_roll_circuit_breaker_day(&portfolio);

        // 3. Generate signals.
        let entry_criteria = self.portfolio.entry_criteria_store().load();
        let mut signals = Vec::new();
        let mut momentum_by_symbol = HashMap::new();

        for (symbol, data) in &snapshot.symbols {
            let mut enriched = data.clone();
            signal_generator::enrich_symbol_data(&mut enriched);

            if let Some(momentum) = momentum_20d(&enriched) {
                momentum_by_symbol.insert(symbol.clone(), momentum);
            }

            signals.extend(signal_generator::generate_entry_signals(
                &enriched,
                &self.filter_cfg,
            ));

            if let Some(position) = portfolio.position_for(symbol) {
                if let Some(exit) = signal_generator::check_exit_signals(
                    &enriched,
                    &entry_criteria,
                    position.is_long(),
                ) {
                    signals.push(exit);
                }
            }
        }

        let scored = signal_generator::score_signals(&signals, &portfolio, &momentum_by_symbol);

        // 4. Research enrichment for high-scoring entries.
        let research = self.gather_research(&scored).await;

        // 5. Make decision.
        let decision = self
            .decision
            .make_decision(&scored, &research.values().cloned().collect::<Vec<_>>(), &portfolio)
            .await;

        // 6. Apply risk gate.
        let mut risk_result = risk_manager::evaluate(&decision, &portfolio, &self.risk_cfg);

        // 7. Sizer x circuit-breaker multiplier (entries only).
        self.apply_sizing(&mut risk_result, &portfolio);

        // 8. Execute or queue.
        let (order_result, pending_trade) =
            self.execution.execute(risk_result.clone(), &portfolio).await;

        // 9. Persist EntryCriteria on a successful entry fill; record a
        // realized TradeRecord and clear EntryCriteria on a successful exit.
        self.handle_post_execution(&risk_result.final_decision, &order_result, &portfolio);

        // 10. Write LoopResult.
        let mut result = LoopResult::new(snapshot, decision);
        result.signals = scored;
        result.portfolio = Some(portfolio);
        result.risk_result = Some(risk_result);
        result.order_result = Some(order_result);
        result.pending_trade = pending_trade;
        result.research = research;
        result.duration_ms = started.elapsed().as_millis() as u64;

        self.store.record_loop(&result);
        result
    }

    async fn gather_research(
        &self,
        scored: &[trading_core::ScoredSignal],
    ) -> HashMap<String, ResearchInsight> {
        let mut out = HashMap::new();
        let Some(research) = &self.research else {
            return out;
        };

        for s in scored {
            if s.signal.direction.is_exit() {
                continue;
            }
            if s.total_score() < self.research_score_threshold {
                continue;
            }
            if let Some(insight) = research.research(&s.signal.symbol).await {
                out.insert(s.signal.symbol.clone(), insight);
            }
        }

        out
    }

    fn apply_sizing(&self, risk_result: &mut trading_core::RiskResult, portfolio: &PortfolioState) {
        if !risk_result.allowed {
            return;
        }
        let Decision::Trade(trade) = &mut risk_result.final_decision else {
            return;
        };
        if trade.is_exit() {
            return;
        }

        let today_pct = if portfolio.equity > 0.0 {
            portfolio.pnl_day / portfolio.equity
        } else {
            0.0
        };
        let multiplier = self.breaker.multiplier(today_pct);

        let sized = self.sizer.size_position(
            portfolio.equity,
            trade.signal.score_hint,
            Some(trade.signal.atr_n),
            Some(trade.signal.current_price),
        );

        trade.notional_usd = trade.notional_usd.min(sized * multiplier);
    }

    fn handle_post_execution(
        &self,
        final_decision: &Decision,
        order_result: &trading_core::OrderResult,
        portfolio: &PortfolioState,
    ) {
        let Decision::Trade(trade) = final_decision else {
            return;
        };
        let filled = matches!(order_result.status.as_str(), "accepted" | "filled");
        if !filled {
            return;
        }

        if !trade.is_exit() {
            let criteria = EntryCriteria {
                symbol: trade.symbol.clone(),
                stop_price: trade.stop_price,
                exit_ref: trade.exit_trigger,
                atr_at_entry: trade.signal.atr_n,
                system: trade.signal.system,
                entered_at: Utc::now(),
            };
            if let Err(e) = self.portfolio.save_entry_criteria(&trade.symbol, criteria) {
                tracing::warn!(symbol = %trade.symbol, error = %e, "failed to persist entry criteria");
            }
            return;
        }

        // Exit: record the realized trade for the sizer's Kelly stats, then
        // drop the stale entry criteria so the next tick stops emitting
        // exits for a position that no longer exists.
        if let Some(position) = portfolio.position_for(&trade.symbol) {
            let exit_price = order_result
                .filled_avg_price
                .unwrap_or(trade.signal.current_price);
            let qty = position.qty.abs();
            let sign = if position.is_long() { 1.0 } else { -1.0 };
            let pnl_usd = (exit_price - position.avg_entry_price) * qty * sign;
            let return_pct = if position.avg_entry_price > 0.0 {
                pnl_usd / (position.avg_entry_price * qty)
            } else {
                0.0
            };
            let record = TradeRecord {
                symbol: trade.symbol.clone(),
                side: trade.side.clone(),
                entry_price: position.avg_entry_price,
                exit_price,
                qty,
                return_pct,
                pnl_usd,
                timestamp: Utc::now(),
            };
            if let Err(e) = self.sizer.record_trade(record) {
                tracing::warn!(symbol = %trade.symbol, error = %e, "failed to record trade history");
            }
        }

        if let Err(e) = self.portfolio.clear_entry_criteria(&trade.symbol) {
            tracing::warn!(symbol = %trade.symbol, error = %e, "failed to clear entry criteria");
        }
    }

    /// At most once per UTC day, roll the prior day's realized P&L% into the
    /// circuit breaker's rolling window. Uses the last portfolio snapshot
    /// seen before the date advanced, which is the best approximation of
    /// "yesterday's close" available without a dedicated EOD job.
    fn maybe_roll_circuit_breaker_day(&self, portfolio: &PortfolioState) {
        let today = Utc::now().date_naive();
        let mut last = self.last_rollover_day.lock().unwrap();
        match *last {
            Some(prev) if prev != today => {
                let pct = if portfolio.equity > 0.0 {
                    portfolio.pnl_day / portfolio.equity
                } else {
                    0.0
                };
                if let Err(e) = self.breaker.record_day_close(pct) {
                    tracing::warn!(error = %e, "failed to roll circuit breaker window");
                }
                *last = Some(today);
            }
            None => *last = Some(today),
            _ => {}
        }
    }
}

fn empty_portfolio() -> PortfolioState {
    PortfolioState {
        equity: 0.0,
        cash: 0.0,
        buying_power: 0.0,
        positions: vec![],
        open_order_count: 0,
        trades_today: 0,
        pnl_day: 0.0,
    }
}

/// Raw 20-bar price momentum (not yet divided by ATR; the scorer does that).
fn momentum_20d(data: &trading_core::SymbolData) -> Option<f64> {
    let price = data.last_price()?;
    let len = data.bars.len();
    if len < 21 {
        return None;
    }
    Some(price - data.bars[len - 21].close)
}
