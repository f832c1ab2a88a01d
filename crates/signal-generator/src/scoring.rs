//! Deterministic signal scoring: breakout strength, system bonus, momentum,
//! and a correlation penalty against symbols already held in related sectors.

use std::collections::{HashMap, HashSet};
use trading_core::{PortfolioState, ScoreBreakdown, ScoredSignal, Signal, SignalDirection, TurtleSystem};

/// Fixed sector buckets used only to penalise adding correlated exposure.
/// Unknown symbols fall into "other", which never collides with a held
/// position (a symbol can only collide with itself being in a named group).
pub const CORRELATION_GROUPS: &[(&str, &[&str])] = &[
    ("tech", &["AAPL", "MSFT", "GOOGL", "GOOG", "NVDA", "AMD", "AVGO", "ORCL", "CRM", "ADBE"]),
    ("communication", &["META", "NFLX", "DIS", "CMCSA", "TMUS", "VZ", "T"]),
    ("consumer", &["AMZN", "TSLA", "HD", "MCD", "NKE", "SBUX", "TGT", "COST"]),
    ("finance", &["JPM", "BAC", "WFC", "GS", "MS", "C", "SCHW", "BLK"]),
    ("energy", &["XOM", "CVX", "COP", "SLB", "EOG", "MPC"]),
    ("healthcare", &["UNH", "JNJ", "LLY", "PFE", "ABBV", "MRK", "TMO"]),
    ("index", &["SPY", "QQQ", "IWM", "DIA", "VOO", "VTI"]),
];

fn correlation_group(symbol: &str) -> &'static str {
    for (group, members) in CORRELATION_GROUPS {
        if members.contains(&symbol) {
            return group;
        }
    }
    "other"
}

fn held_correlation_groups(portfolio: &PortfolioState) -> HashSet<&'static str> {
    portfolio
        .positions
        .iter()
        .map(|p| correlation_group(&p.symbol))
        .filter(|g| *g != "other")
        .collect()
}

fn system_bonus(system: TurtleSystem) -> f64 {
    match system {
        TurtleSystem::S1 => 0.0,
        TurtleSystem::S2 => 1.0,
    }
}

fn score_one(
    signal: &Signal,
    held_groups: &HashSet<&'static str>,
    momentum_by_symbol: &HashMap<String, f64>,
) -> ScoredSignal {
    if signal.direction.is_exit() {
        return ScoredSignal {
            signal: signal.clone(),
            breakdown: ScoreBreakdown {
                breakout_strength: 1.0,
                system_bonus: 0.0,
                momentum_per_n: 0.0,
                correlation_penalty: 0.0,
            },
        };
    }

    let long = signal.direction.is_long();
    let breakout_strength = crate::indicators::breakout_strength(
        signal.current_price,
        signal.entry_ref,
        signal.atr_n,
        long,
    );

    let momentum_per_n = momentum_by_symbol
        .get(&signal.symbol)
        .filter(|_| signal.atr_n > 0.0)
        .map(|m| m / signal.atr_n)
        .unwrap_or(0.0);

    let group = correlation_group(&signal.symbol);
    let correlation_penalty = if held_groups.contains(group) { 0.5 } else { 0.0 };

    ScoredSignal {
        signal: signal.clone(),
        breakdown: ScoreBreakdown {
            breakout_strength,
            system_bonus: system_bonus(signal.system),
            momentum_per_n,
            correlation_penalty,
        },
    }
}

/// Score every signal and sort descending by total score, with exits always
/// ahead of entries (exits score a flat 3.0 breakout component).
pub fn score_signals(
    signals: &[Signal],
    portfolio: &PortfolioState,
    momentum_by_symbol: &HashMap<String, f64>,
) -> Vec<ScoredSignal> {
    let held_groups = held_correlation_groups(portfolio);
    let mut scored: Vec<ScoredSignal> = signals
        .iter()
        .map(|s| score_one(s, &held_groups, momentum_by_symbol))
        .collect();
    scored.sort_by(|a, b| {
        b.signal
            .direction
            .is_exit()
            .cmp(&a.signal.direction.is_exit())
            .then(b.total_score().partial_cmp(&a.total_score()).unwrap_or(std::cmp::Ordering::Equal))
    });
    scored
}

/// Highest-scored entry-direction signal, if any. Exits are never returned
/// here — callers pull exits out of the scored list directly since all of
/// them are acted on, not just the best one.
pub fn pick_best_entry(scored: &[ScoredSignal]) -> Option<&ScoredSignal> {
    scored.iter().find(|s| !s.signal.direction.is_exit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry_signal(symbol: &str, strength_price: f64) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            direction: SignalDirection::Long,
            system: TurtleSystem::S2,
            entry_ref: 450.0,
            current_price: strength_price,
            atr_n: 5.0,
            stop_price: strength_price - 10.0,
            exit_ref: 440.0,
            score_hint: 0.7,
            reason: "test".to_string(),
            volume_confirmed: None,
            trend_aligned: None,
            filters_passed: true,
            filter_notes: vec![],
        }
    }

    fn empty_portfolio() -> PortfolioState {
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

    #[test]
    fn exits_always_sort_before_entries() {
        let mut portfolio = empty_portfolio();
        portfolio.positions.push(trading_core::Position {
            symbol: "NVDA".to_string(),
            qty: 10.0,
            avg_entry_price: 100.0,
            market_value: 1000.0,
            unrealized_pl: 0.0,
            unrealized_plpc: 0.0,
            entry_criteria: None,
        });
        let exit = Signal {
            direction: SignalDirection::ExitLong,
            ..entry_signal("NVDA", 90.0)
        };
        let entry = entry_signal("AAPL", 500.0);
        let scored = score_signals(&[entry, exit], &portfolio, &HashMap::new());
        assert!(scored[0].signal.direction.is_exit());
    }

    #[test]
    fn correlation_penalty_applies_only_when_group_already_held() {
        let mut portfolio = empty_portfolio();
        portfolio.positions.push(trading_core::Position {
            symbol: "MSFT".to_string(),
            qty: 10.0,
            avg_entry_price: 300.0,
            market_value: 3000.0,
            unrealized_pl: 0.0,
            unrealized_plpc: 0.0,
            entry_criteria: None,
        });
        let signal = entry_signal("NVDA", 500.0); // tech, same group as MSFT
        let scored = score_signals(&[signal], &portfolio, &HashMap::new());
        assert_eq!(scored[0].breakdown.correlation_penalty, 0.5);
    }

    #[test]
    fn pick_best_entry_skips_exits() {
        let exit = Signal {
            direction: SignalDirection::ExitLong,
            ..entry_signal("NVDA", 90.0)
        };
        let portfolio = empty_portfolio();
        let scored = score_signals(&[exit], &portfolio, &HashMap::new());
        assert!(pick_best_entry(&scored).is_none());
    }
}
