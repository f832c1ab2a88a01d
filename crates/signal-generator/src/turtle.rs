//! System 1 (20-day channel) and System 2 (55-day channel) breakout signals,
//! plus the exit signals generated for positions opened under either system.

use crate::indicators::{
    atr_simple_mean, breakout_strength, highest_high, lowest_low, sma, volume_average,
};
use std::collections::HashMap;
use trading_core::{EntryCriteria, Signal, SignalDirection, SymbolData, TurtleSystem};

#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    pub volume_filter_enabled: bool,
    pub volume_threshold: f64,
    pub trend_filter_enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            volume_filter_enabled: false,
            volume_threshold: 1.5,
            trend_filter_enabled: false,
        }
    }
}

/// Fill in the derived channel/ATR/volume/trend fields on `data` from its bar
/// history. Idempotent; call once per tick before generating signals.
pub fn enrich_symbol_data(data: &mut SymbolData) {
    data.atr_20 = atr_simple_mean(&data.bars, 20);
    data.high_20 = highest_high(&data.bars, 20);
    data.low_20 = lowest_low(&data.bars, 20);
    data.high_55 = highest_high(&data.bars, 55);
    data.low_55 = lowest_low(&data.bars, 55);
    data.high_10 = highest_high(&data.bars, 10);
    data.low_10 = lowest_low(&data.bars, 10);
    data.volume_avg_20 = volume_average(&data.bars, 20);
    data.current_volume = data.bars.last().map(|b| b.volume);
    data.sma_50 = sma(&data.bars, 50);
    data.sma_200 = sma(&data.bars, 200);

    data.volume_confirmed = match (data.current_volume, data.volume_avg_20) {
        (Some(v), Some(avg)) if avg > 0.0 => Some(v as f64 >= avg * 1.5),
        _ => None,
    };
    data.trend_aligned = match (data.last_price(), data.sma_50, data.sma_200) {
        (Some(price), Some(s50), Some(s200)) => Some(price > s50 && s50 > s200),
        _ => None,
    };
}

fn passes_filters(data: &SymbolData, cfg: &FilterConfig, long: bool) -> (bool, Vec<String>) {
    let mut notes = Vec::new();
    let mut ok = true;

    if cfg.volume_filter_enabled {
        match data.volume_confirmed {
            Some(true) => notes.push("volume confirmed".to_string()),
            Some(false) => {
                notes.push("volume not confirmed".to_string());
                ok = false;
            }
            None => notes.push("volume data unavailable".to_string()),
        }
    }

    if cfg.trend_filter_enabled {
        match data.trend_aligned {
            Some(aligned) if aligned == long => notes.push("trend aligned".to_string()),
            Some(_) => {
                notes.push("trend not aligned".to_string());
                ok = false;
            }
            None => notes.push("trend data unavailable".to_string()),
        }
    }

    (ok, notes)
}

fn score_hint_for_entry(price: f64, entry_ref: f64, atr: f64, long: bool) -> f64 {
    let strength = breakout_strength(price, entry_ref, atr, long);
    (0.5 + 0.2 * strength).clamp(0.0, 1.0)
}

fn check_system_signals(
    data: &SymbolData,
    system: TurtleSystem,
    entry_period: usize,
    exit_period: usize,
    cfg: &FilterConfig,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    let (price, atr) = match (data.last_price(), data.atr_20) {
        (Some(p), Some(a)) if a > 0.0 => (p, a),
        _ => return signals,
    };

    let (entry_high, entry_low) = match entry_period {
        20 => (data.high_20, data.low_20),
        55 => (data.high_55, data.low_55),
        _ => (None, None),
    };
    let exit_ref_long = match exit_period {
        10 => data.low_10,
        20 => data.low_20,
        _ => None,
    };
    let exit_ref_short = match exit_period {
        10 => data.high_10,
        20 => data.high_20,
        _ => None,
    };

    if let (Some(high), Some(exit_ref)) = (entry_high, exit_ref_long) {
        if price > high {
            let (filters_passed, filter_notes) = passes_filters(data, cfg, true);
            if filters_passed {
                signals.push(Signal {
                    symbol: data.symbol.clone(),
                    direction: SignalDirection::Long,
                    system,
                    entry_ref: high,
                    current_price: price,
                    atr_n: atr,
                    stop_price: price - 2.0 * atr,
                    exit_ref,
                    score_hint: score_hint_for_entry(price, high, atr, true),
                    reason: format!(
                        "{:?} long breakout above {:.2} ({}-day high)",
                        system, high, entry_period
                    ),
                    volume_confirmed: data.volume_confirmed,
                    trend_aligned: data.trend_aligned,
                    filters_passed,
                    filter_notes,
                });
            }
        }
    }

    if let (Some(low), Some(exit_ref)) = (entry_low, exit_ref_short) {
        if price < low {
            let (filters_passed, filter_notes) = passes_filters(data, cfg, false);
            if filters_passed {
                signals.push(Signal {
                    symbol: data.symbol.clone(),
                    direction: SignalDirection::Short,
                    system,
                    entry_ref: low,
                    current_price: price,
                    atr_n: atr,
                    stop_price: price + 2.0 * atr,
                    exit_ref,
                    score_hint: score_hint_for_entry(price, low, atr, false),
                    reason: format!(
                        "{:?} short breakdown below {:.2} ({}-day low)",
                        system, low, entry_period
                    ),
                    volume_confirmed: data.volume_confirmed,
                    trend_aligned: data.trend_aligned,
                    filters_passed,
                    filter_notes,
                });
            }
        }
    }

    signals
}

/// Entry signals for a single symbol: System 1 (20-day) then System 2
/// (55-day). System 2 requires 55 bars of history; symbols with fewer are
/// silently skipped for that system only.
pub fn generate_entry_signals(data: &SymbolData, cfg: &FilterConfig) -> Vec<Signal> {
    let mut signals = check_system_signals(data, TurtleSystem::S1, 20, 10, cfg);
    if data.bars.len() >= 55 {
        signals.extend(check_system_signals(data, TurtleSystem::S2, 55, 20, cfg));
    }
    signals
}

/// Exit signals for symbols with an open position and recorded entry
/// criteria. Stop-hit dominates a system exit when both would fire.
pub fn check_exit_signals(
    data: &SymbolData,
    criteria: &HashMap<String, EntryCriteria>,
    is_long: bool,
) -> Option<Signal> {
    let entry = criteria.get(&data.symbol)?;
    let price = data.last_price()?;

    let stop_hit = if is_long {
        price <= entry.stop_price
    } else {
        price >= entry.stop_price
    };
    let system_exit = if is_long {
        price < entry.exit_ref
    } else {
        price > entry.exit_ref
    };

    if !stop_hit && !system_exit {
        return None;
    }

    let direction = if is_long {
        SignalDirection::ExitLong
    } else {
        SignalDirection::ExitShort
    };

    let (score_hint, reason) = if stop_hit {
        (
            1.0,
            format!("STOP LOSS hit at {:.2} (stop {:.2})", price, entry.stop_price),
        )
    } else {
        (
            0.9,
            format!(
                "System exit: price {:.2} crossed exit reference {:.2}",
                price, entry.exit_ref
            ),
        )
    };

    Some(Signal {
        symbol: data.symbol.clone(),
        direction,
        system: entry.system,
        entry_ref: entry.exit_ref,
        current_price: price,
        atr_n: entry.atr_at_entry,
        stop_price: entry.stop_price,
        exit_ref: entry.exit_ref,
        score_hint,
        reason,
        volume_confirmed: data.volume_confirmed,
        trend_aligned: data.trend_aligned,
        filters_passed: true,
        filter_notes: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trading_core::{Quote, TurtleSystem};

    fn make_bars(closes: &[f64]) -> Vec<trading_core::Bar> {
        closes
            .iter()
            .map(|&c| trading_core::Bar {
                timestamp: Utc::now(),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1_000_000,
            })
            .collect()
    }

    #[test]
    fn s1_long_breakout_sets_stop_two_atr_below_price() {
        let mut closes: Vec<f64> = (1..=30).map(|i| 400.0 + i as f64).collect();
        closes.push(456.0);
        let mut data = SymbolData::new("SPY", make_bars(&closes), Some(Quote {
            bid: 455.9,
            ask: 456.1,
            last: 456.0,
            timestamp: Utc::now(),
        }));
        enrich_symbol_data(&mut data);
        let signals = generate_entry_signals(&data, &FilterConfig::default());
        let long = signals
            .iter()
            .find(|s| matches!(s.direction, SignalDirection::Long) && s.system == TurtleSystem::S1);
        assert!(long.is_some());
        let long = long.unwrap();
        assert!((long.stop_price - (long.current_price - 2.0 * long.atr_n)).abs() < 1e-9);
        assert!(long.current_price > long.entry_ref);
    }

    #[test]
    fn exit_signal_prefers_stop_hit_wording_over_system_exit() {
        let mut criteria = HashMap::new();
        criteria.insert(
            "SPY".to_string(),
            EntryCriteria {
                symbol: "SPY".to_string(),
                stop_price: 446.0,
                exit_ref: 440.0,
                atr_at_entry: 5.0,
                system: TurtleSystem::S2,
                entered_at: Utc::now(),
            },
        );
        let mut data = SymbolData::new(
            "SPY",
            make_bars(&[450.0, 448.0, 445.0]),
            Some(Quote {
                bid: 444.9,
                ask: 445.1,
                last: 445.0,
                timestamp: Utc::now(),
            }),
        );
        enrich_symbol_data(&mut data);
        let signal = check_exit_signals(&data, &criteria, true).unwrap();
        assert_eq!(signal.score_hint, 1.0);
        assert!(signal.reason.contains("STOP LOSS"));
    }

    #[test]
    fn no_position_criteria_means_no_exit_signal() {
        let criteria = HashMap::new();
        let mut data = SymbolData::new("SPY", make_bars(&[450.0, 448.0, 445.0]), None);
        enrich_symbol_data(&mut data);
        assert!(check_exit_signals(&data, &criteria, true).is_none());
    }
}
