#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Paper,
    Shadow,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutonomyTier {
    Manual,
    Moderate,
    FullAgentic,
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub trading_mode: TradingMode,
    pub autonomy_tier: AutonomyTier,
    pub live_trading_enabled: bool,
}

impl ExecutionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let trading_mode = match std::env::var("TRADING_MODE")
            .unwrap_or_else(|_| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => TradingMode::Paper,
            "shadow" => TradingMode::Shadow,
            "live" => TradingMode::Live,
            other => anyhow::bail!("unknown TRADING_MODE: {other}"),
        };

        let autonomy_tier = match std::env::var("AUTONOMY_TIER")
            .unwrap_or_else(|_| "manual".to_string())
            .to_lowercase()
            .as_str()
        {
            "manual" => AutonomyTier::Manual,
            "moderate" => AutonomyTier::Moderate,
            "full_agentic" => AutonomyTier::FullAgentic,
            other => anyhow::bail!("unknown AUTONOMY_TIER: {other}"),
        };

        let live_trading_enabled = std::env::var("LIVE_TRADING_ENABLED")
            .ok()
            .map(|v| v == "true")
            .unwrap_or(false);

        if trading_mode == TradingMode::Live && !live_trading_enabled {
            anyhow::bail!(
                "TRADING_MODE=live requires LIVE_TRADING_ENABLED=true; refusing to start"
            );
        }

        Ok(Self {
            trading_mode,
            autonomy_tier,
            live_trading_enabled,
        })
    }

    /// Whether this config permits actually sending orders to the broker at
    /// all (shadow mode logs intent but never submits).
    pub fn can_execute_orders(&self) -> bool {
        !matches!(self.trading_mode, TradingMode::Shadow)
    }
}
