//! Deterministic policy wall between the decision agent and the broker.
//! Every rule is evaluated and any violation collapses the decision to
//! `NoTrade`; nothing here can raise an error — a bad decision is a result,
//! not an exception.

use crate::RiskConfig;
use trading_core::{Decision, NoTrade, PortfolioState, RiskResult, TradeIntent};

pub fn evaluate(decision: &Decision, portfolio: &PortfolioState, cfg: &RiskConfig) -> RiskResult {
    let intent = match decision {
        Decision::NoTrade(_) => {
            return RiskResult {
                allowed: true,
                notes: vec![],
                violations: vec![],
                original_decision: decision.clone(),
                final_decision: decision.clone(),
            }
        }
        Decision::Trade(t) => t.clone(),
    };

    let mut notes = Vec::new();
    let mut violations = Vec::new();
    let is_exit = intent.is_exit();

    if !cfg.allowed_symbols.is_empty() && !cfg.allowed_symbols.contains(&intent.symbol) {
        violations.push(format!("Symbol {} is not in the allowlist", intent.symbol));
    }

    let mut intent = intent;
    if intent.notional_usd > cfg.max_dollars_per_trade {
        notes.push(format!(
            "Notional resized from ${:.2} to cap ${:.2}",
            intent.notional_usd, cfg.max_dollars_per_trade
        ));
        intent.notional_usd = cfg.max_dollars_per_trade;
    }

    if !is_exit {
        let buy = intent.side == "buy";
        if buy && portfolio.position_for(&intent.symbol).is_some() {
            violations.push(format!("No pyramiding: already holding {}", intent.symbol));
        }
        if buy && portfolio.positions.len() >= cfg.max_open_positions {
            violations.push(format!(
                "Position cap reached: {} >= {}",
                portfolio.positions.len(),
                cfg.max_open_positions
            ));
        }
    }

    if portfolio.trades_today >= cfg.max_trades_per_day {
        violations.push(format!(
            "Daily trade count reached: {} >= {}",
            portfolio.trades_today, cfg.max_trades_per_day
        ));
    }

    if portfolio.pnl_day <= -cfg.max_daily_loss {
        violations.push(format!(
            "Daily loss limit breached: {:.2} <= -{:.2}",
            portfolio.pnl_day, cfg.max_daily_loss
        ));
    }

    if intent.notional_usd > portfolio.buying_power {
        violations.push(format!(
            "Insufficient buying power: ${:.2} > ${:.2}",
            intent.notional_usd, portfolio.buying_power
        ));
    }

    let final_decision = if violations.is_empty() {
        Decision::Trade(intent)
    } else {
        Decision::NoTrade(NoTrade {
            reason: format!("Risk gate blocked: {}", violations.join("; ")),
            signals_considered: None,
        })
    };

    RiskResult {
        allowed: violations.is_empty(),
        notes,
        violations,
        original_decision: decision.clone(),
        final_decision,
    }
}

fn base_intent(symbol: &str, side: &str, notional: f64, exit: bool) -> TradeIntent {
    use trading_core::{Signal, SignalDirection, Thesis, TurtleSystem};
    TradeIntent {
        symbol: symbol.to_string(),
        side: side.to_string(),
        notional_usd: notional,
        signal: Signal {
            symbol: symbol.to_string(),
            direction: if exit {
                SignalDirection::ExitLong
            } else {
                SignalDirection::Long
            },
            system: TurtleSystem::S1,
            entry_ref: 100.0,
            current_price: 105.0,
            atr_n: 2.0,
            stop_price: 101.0,
            exit_ref: 95.0,
            score_hint: 0.7,
            reason: "test".to_string(),
            volume_confirmed: None,
            trend_aligned: None,
            filters_passed: true,
            filter_notes: vec![],
        },
        stop_price: 101.0,
        exit_trigger: 95.0,
        thesis: Thesis {
            summary: "test".to_string(),
            system: None,
            breakout_days: None,
            atr_n: None,
            stop_n: None,
            signal_score: None,
            portfolio_fit: None,
            regime: None,
        },
        confidence: 0.8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn cfg() -> RiskConfig {
        RiskConfig {
            allowed_symbols: ["SPY".to_string(), "NVDA".to_string()].into_iter().collect(),
            max_dollars_per_trade: 25.0,
            max_open_positions: 5,
            max_trades_per_day: 10,
            max_daily_loss: 500.0,
        }
    }

    #[test]
    fn allowed_trade_passes_unmodified_when_under_limits() {
        let decision = Decision::Trade(base_intent("SPY", "buy", 20.0, false));
        let result = evaluate(&decision, &portfolio(), &cfg());
        assert!(result.allowed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn oversized_notional_is_resized_not_rejected() {
        let decision = Decision::Trade(base_intent("SPY", "buy", 1000.0, false));
        let result = evaluate(&decision, &portfolio(), &cfg());
        assert!(result.allowed);
        let trade = result.final_decision.as_trade().unwrap();
        assert_eq!(trade.notional_usd, 25.0);
        assert!(!result.notes.is_empty());
    }

    #[test]
    fn symbol_outside_allowlist_is_blocked() {
        let decision = Decision::Trade(base_intent("TSLA", "buy", 20.0, false));
        let result = evaluate(&decision, &portfolio(), &cfg());
        assert!(!result.allowed);
        assert!(matches!(result.final_decision, Decision::NoTrade(_)));
    }

    #[test]
    fn pyramiding_into_existing_position_is_blocked() {
        let mut p = portfolio();
        p.positions.push(trading_core::Position {
            symbol: "NVDA".to_string(),
            qty: 5.0,
            avg_entry_price: 100.0,
            market_value: 500.0,
            unrealized_pl: 0.0,
            unrealized_plpc: 0.0,
            entry_criteria: None,
        });
        let decision = Decision::Trade(base_intent("NVDA", "buy", 20.0, false));
        let result = evaluate(&decision, &p, &cfg());
        assert!(!result.allowed);
        assert!(result.violations[0].contains("No pyramiding"));
    }

    #[test]
    fn exit_trades_bypass_pyramiding_and_position_cap() {
        let mut p = portfolio();
        for i in 0..5 {
            p.positions.push(trading_core::Position {
                symbol: format!("SYM{}", i),
                qty: 5.0,
                avg_entry_price: 100.0,
                market_value: 500.0,
                unrealized_pl: 0.0,
                unrealized_plpc: 0.0,
                entry_criteria: None,
            });
        }
        let decision = Decision::Trade(base_intent("SPY", "sell", 20.0, true));
        let result = evaluate(&decision, &p, &cfg());
        assert!(result.allowed);
    }

    #[test]
    fn daily_loss_at_exact_limit_blocks() {
        let mut p = portfolio();
        p.pnl_day = -500.0;
        let decision = Decision::Trade(base_intent("SPY", "buy", 20.0, false));
        let result = evaluate(&decision, &p, &cfg());
        assert!(!result.allowed);
    }

    #[test]
    fn trades_today_at_exact_cap_blocks_next_buy() {
        let mut p = portfolio();
        p.trades_today = 10;
        let decision = Decision::Trade(base_intent("SPY", "buy", 20.0, false));
        let result = evaluate(&decision, &p, &cfg());
        assert!(!result.allowed);
    }

    #[test]
    fn buying_power_shortfall_blocks() {
        let mut p = portfolio();
        p.buying_power = 10.0;
        let decision = Decision::Trade(base_intent("SPY", "buy", 20.0, false));
        let result = evaluate(&decision, &p, &cfg());
        assert!(!result.allowed);
    }

    #[test]
    fn no_trade_passes_through_unchanged() {
        let decision = Decision::no_trade("nothing to do");
        let result = evaluate(&decision, &portfolio(), &cfg());
        assert!(result.allowed);
        assert!(result.violations.is_empty());
    }
}
