//! Rolling trade-history Kelly sizer: the component the orchestrator actually
//! calls per tick. Distinct from the confidence-based `KellyPositionSizer`
//! above — this one derives its win rate and win/loss ratio empirically from
//! recorded trades rather than from an externally supplied `StrategyPerformance`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trading_core::{atomic_read_json, atomic_write_json, TradeRecord};

#[derive(Debug, Clone)]
pub struct SizerConfig {
    pub enabled: bool,
    pub kelly_fraction: f64,
    pub lookback_trades: usize,
    pub min_trades: usize,
    pub max_position_pct: f64,
}

impl SizerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("KELLY_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            kelly_fraction: std::env::var("KELLY_FRACTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.5),
            lookback_trades: std::env::var("KELLY_LOOKBACK_TRADES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            min_trades: std::env::var("KELLY_MIN_TRADES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_position_pct: std::env::var("KELLY_MAX_POSITION_PCT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.10),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryState {
    trades: Vec<TradeRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KellyStats {
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub sample_size: usize,
}

pub struct TradeHistorySizer {
    history_path: PathBuf,
    cfg: SizerConfig,
}

const CONSERVATIVE_FRACTION: f64 = 0.05;
const VOLATILITY_TARGET: f64 = 0.03;

impl TradeHistorySizer {
    pub fn new(history_path: impl Into<PathBuf>, cfg: SizerConfig) -> Self {
        Self {
            history_path: history_path.into(),
            cfg,
        }
    }

    fn load(&self) -> HistoryState {
        atomic_read_json(&self.history_path, HistoryState::default())
    }

    /// Record a completed trade, truncating the retained history to twice
    /// the lookback window (enough for stats plus headroom).
    pub fn record_trade(&self, trade: TradeRecord) -> anyhow::Result<()> {
        let mut state = self.load();
        state.trades.push(trade);
        let cap = self.cfg.lookback_trades * 2;
        if state.trades.len() > cap {
            let drop = state.trades.len() - cap;
            state.trades.drain(0..drop);
        }
        atomic_write_json(&self.history_path, &state)?;
        Ok(())
    }

    fn recent_stats(&self) -> KellyStats {
        let state = self.load();
        let window = state.trades.len().min(self.cfg.lookback_trades);
        let recent = &state.trades[state.trades.len() - window..];

        let wins: Vec<f64> = recent.iter().filter(|t| t.is_win()).map(|t| t.pnl_usd).collect();
        let losses: Vec<f64> = recent
            .iter()
            .filter(|t| !t.is_win())
            .map(|t| t.pnl_usd.abs())
            .collect();

        let win_rate = if recent.is_empty() {
            0.0
        } else {
            wins.len() as f64 / recent.len() as f64
        };
        let avg_win = if wins.is_empty() {
            0.0
        } else {
            wins.iter().sum::<f64>() / wins.len() as f64
        };
        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f64>() / losses.len() as f64
        };

        KellyStats {
            win_rate,
            avg_win,
            avg_loss,
            sample_size: recent.len(),
        }
    }

    /// Kelly fraction `f* = win_rate - (1-win_rate)/ratio`, clamped to [0,1].
    fn kelly_fraction(stats: &KellyStats) -> f64 {
        if stats.avg_loss <= 0.0 {
            return 0.0;
        }
        let ratio = stats.avg_win / stats.avg_loss;
        let raw = stats.win_rate - (1.0 - stats.win_rate) / ratio;
        raw.clamp(0.0, 1.0)
    }

    /// Position size in dollars for a signal with given `signal_strength`
    /// (0..1), current equity, and optional ATR/price for the volatility
    /// scale-down.
    pub fn size_position(
        &self,
        equity: f64,
        signal_strength: f64,
        atr: Option<f64>,
        price: Option<f64>,
    ) -> f64 {
        if !self.cfg.enabled {
            return equity * CONSERVATIVE_FRACTION;
        }

        let stats = self.recent_stats();
        let fraction = if stats.sample_size < self.cfg.min_trades {
            CONSERVATIVE_FRACTION
        } else {
            let kelly = Self::kelly_fraction(&stats);
            (kelly * self.cfg.kelly_fraction * signal_strength).min(self.cfg.max_position_pct)
        };

        let mut position_usd = equity * fraction;

        if let (Some(atr), Some(price)) = (atr, price) {
            if price > 0.0 {
                let vol_ratio = atr / price;
                if vol_ratio > VOLATILITY_TARGET {
                    position_usd *= VOLATILITY_TARGET / vol_ratio;
                }
            }
        }

        position_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use tempfile::tempdir;

    fn cfg() -> SizerConfig {
        SizerConfig {
            enabled: true,
            kelly_fraction: 0.5,
            lookback_trades: 30,
            min_trades: 10,
            max_position_pct: 0.10,
        }
    }

    fn trade(pnl: f64) -> TradeRecord {
        TradeRecord {
            symbol: "SPY".to_string(),
            side: "buy".to_string(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            qty: 1.0,
            return_pct: pnl / 100.0,
            pnl_usd: pnl,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn under_min_trades_uses_conservative_fraction() {
        let dir = tempdir().unwrap();
        let sizer = TradeHistorySizer::new(dir.path().join("kelly.json"), cfg());
        for _ in 0..5 {
            sizer.record_trade(trade(10.0)).unwrap();
        }
        let size = sizer.size_position(10_000.0, 1.0, None, None);
        assert_relative_eq!(size, 500.0, epsilon = 0.01);
    }

    #[test]
    fn enough_history_uses_kelly_formula() {
        let dir = tempdir().unwrap();
        let sizer = TradeHistorySizer::new(dir.path().join("kelly.json"), cfg());
        for _ in 0..12 {
            sizer.record_trade(trade(100.0)).unwrap();
        }
        for _ in 0..8 {
            sizer.record_trade(trade(-50.0)).unwrap();
        }
        // win_rate = 12/20 = 0.6, ratio = 100/50 = 2, kelly = 0.6 - 0.4/2 = 0.4
        // effective = 0.4 * 0.5 * 1.0 = 0.2, capped at 0.10
        let size = sizer.size_position(10_000.0, 1.0, None, None);
        assert_relative_eq!(size, 1_000.0, epsilon = 0.01);
    }

    #[test]
    fn high_volatility_scales_down_position() {
        let dir = tempdir().unwrap();
        let sizer = TradeHistorySizer::new(dir.path().join("kelly.json"), cfg());
        for _ in 0..5 {
            sizer.record_trade(trade(10.0)).unwrap();
        }
        // conservative 5% = 500; ATR/price = 10/100 = 0.10 > 0.03 -> scale by 0.3
        let size = sizer.size_position(10_000.0, 1.0, Some(10.0), Some(100.0));
        assert_relative_eq!(size, 150.0, epsilon = 0.01);
    }

    #[test]
    fn disabled_sizer_always_conservative() {
        let dir = tempdir().unwrap();
        let mut c = cfg();
        c.enabled = false;
        let sizer = TradeHistorySizer::new(dir.path().join("kelly.json"), c);
        for _ in 0..50 {
            sizer.record_trade(trade(100.0)).unwrap();
        }
        let size = sizer.size_position(10_000.0, 1.0, None, None);
        assert_relative_eq!(size, 500.0, epsilon = 0.01);
    }

    #[test]
    fn history_file_truncates_to_twice_lookback() {
        let dir = tempdir().unwrap();
        let sizer = TradeHistorySizer::new(dir.path().join("kelly.json"), cfg());
        for _ in 0..100 {
            sizer.record_trade(trade(1.0)).unwrap();
        }
        let state = sizer.load();
        assert_eq!(state.trades.len(), cfg().lookback_trades * 2);
    }
}
