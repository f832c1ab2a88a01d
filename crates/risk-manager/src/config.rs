use std::collections::HashSet;

/// Risk policy limits. Constructed once at startup from the environment and
/// shared read-only across ticks — see `SPEC_FULL.md` §9 "Config objects with
/// many fields".
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub allowed_symbols: HashSet<String>,
    pub max_dollars_per_trade: f64,
    pub max_open_positions: usize,
    pub max_trades_per_day: usize,
    pub max_daily_loss: f64,
}

impl RiskConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let allowed_symbols = std::env::var("ALLOWED_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let max_dollars_per_trade = std::env::var("MAX_DOLLARS_PER_TRADE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25.0);
        let max_open_positions = std::env::var("MAX_OPEN_POSITIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let max_trades_per_day = std::env::var("MAX_TRADES_PER_DAY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let max_daily_loss = std::env::var("MAX_DAILY_LOSS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500.0);

        if max_dollars_per_trade <= 0.0 {
            anyhow::bail!("MAX_DOLLARS_PER_TRADE must be positive");
        }
        if max_daily_loss <= 0.0 {
            anyhow::bail!("MAX_DAILY_LOSS must be positive");
        }

        Ok(Self {
            allowed_symbols,
            max_dollars_per_trade,
            max_open_positions,
            max_trades_per_day,
            max_daily_loss,
        })
    }
}
