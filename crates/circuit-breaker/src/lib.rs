//! Rolling drawdown tracker. Keeps the last 7 daily P&L percentages and turns
//! a bad day or a bad week into a hard halt or a scaled-down warning before
//! the sizer ever sees the trade.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trading_core::{atomic_read_json, atomic_write_json, CircuitBreakerStatus};

const WINDOW: usize = 7;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub enabled: bool,
    pub daily_limit: f64,
    pub weekly_limit: f64,
    pub reduction_factor: f64,
}

impl BreakerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("CIRCUIT_BREAKER_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            daily_limit: std::env::var("CIRCUIT_BREAKER_DAILY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.05),
            weekly_limit: std::env::var("CIRCUIT_BREAKER_WEEKLY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.10),
            reduction_factor: std::env::var("CIRCUIT_BREAKER_REDUCTION_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.5),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BreakerState {
    daily_pnl_pct: Vec<f64>,
}

pub struct DrawdownCircuitBreaker {
    state_path: PathBuf,
    cfg: BreakerConfig,
}

impl DrawdownCircuitBreaker {
    pub fn new(state_path: impl Into<PathBuf>, cfg: BreakerConfig) -> Self {
        Self {
            state_path: state_path.into(),
            cfg,
        }
    }

    fn load(&self) -> BreakerState {
        atomic_read_json(&self.state_path, BreakerState::default())
    }

    fn save(&self, state: &BreakerState) -> anyhow::Result<()> {
        atomic_write_json(&self.state_path, state)?;
        Ok(())
    }

    /// Current status given today's running P&L percentage. Does not mutate
    /// state — call `record_day_close` once per trading day to roll the
    /// window forward.
    pub fn status(&self, today_pct: f64) -> CircuitBreakerStatus {
        if !self.cfg.enabled {
            return CircuitBreakerStatus::Normal;
        }
        let state = self.load();
        let weekly: f64 = state.daily_pnl_pct.iter().sum::<f64>() + today_pct;

        if today_pct <= -self.cfg.daily_limit || weekly <= -self.cfg.weekly_limit {
            CircuitBreakerStatus::Halted
        } else if today_pct <= -self.cfg.daily_limit / 2.0 || weekly <= -self.cfg.weekly_limit / 2.0
        {
            CircuitBreakerStatus::Warning
        } else {
            CircuitBreakerStatus::Normal
        }
    }

    pub fn multiplier(&self, today_pct: f64) -> f64 {
        self.status(today_pct).multiplier(self.cfg.reduction_factor)
    }

    /// Push today's realised P&L percentage into the rolling window, keeping
    /// only the last 7 entries. Called once at day rollover, not every tick.
    pub fn record_day_close(&self, today_pct: f64) -> anyhow::Result<()> {
        let mut state = self.load();
        state.daily_pnl_pct.push(today_pct);
        if state.daily_pnl_pct.len() > WINDOW {
            let drop = state.daily_pnl_pct.len() - WINDOW;
            state.daily_pnl_pct.drain(0..drop);
        }
        self.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn path_for_test(dir: &Path) -> PathBuf {
        dir.join("circuit_breaker_state.json")
    }

    fn cfg() -> BreakerConfig {
        BreakerConfig {
            enabled: true,
            daily_limit: 0.05,
            weekly_limit: 0.10,
            reduction_factor: 0.5,
        }
    }

    #[test]
    fn normal_day_is_normal_status() {
        let dir = tempdir().unwrap();
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), cfg());
        assert_eq!(breaker.status(0.01), CircuitBreakerStatus::Normal);
        assert_eq!(breaker.multiplier(0.01), 1.0);
    }

    #[test]
    fn daily_loss_at_exact_limit_halts() {
        let dir = tempdir().unwrap();
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), cfg());
        assert_eq!(breaker.status(-0.05), CircuitBreakerStatus::Halted);
        assert_eq!(breaker.multiplier(-0.05), 0.0);
    }

    #[test]
    fn daily_loss_at_half_limit_warns() {
        let dir = tempdir().unwrap();
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), cfg());
        assert_eq!(breaker.status(-0.025), CircuitBreakerStatus::Warning);
        assert_eq!(breaker.multiplier(-0.025), 0.5);
    }

    #[test]
    fn weekly_loss_accumulates_across_recorded_days() {
        let dir = tempdir().unwrap();
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), cfg());
        for _ in 0..4 {
            breaker.record_day_close(-0.02).unwrap();
        }
        // weekly = -0.08 + today -0.03 = -0.11 <= -0.10 -> halted
        assert_eq!(breaker.status(-0.03), CircuitBreakerStatus::Halted);
    }

    #[test]
    fn window_keeps_only_last_seven_days() {
        let dir = tempdir().unwrap();
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), cfg());
        for _ in 0..10 {
            breaker.record_day_close(-0.001).unwrap();
        }
        let state = breaker.load();
        assert_eq!(state.daily_pnl_pct.len(), WINDOW);
    }

    #[test]
    fn disabled_breaker_always_normal() {
        let dir = tempdir().unwrap();
        let mut c = cfg();
        c.enabled = false;
        let breaker = DrawdownCircuitBreaker::new(path_for_test(dir.path()), c);
        assert_eq!(breaker.status(-1.0), CircuitBreakerStatus::Normal);
    }
}
