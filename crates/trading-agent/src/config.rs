//! Top-level ambient configuration: everything the orchestrator itself needs
//! that isn't already owned by a subsystem's own `*Config::from_env()`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Symbol universe scanned every tick. Falls back to a small default
    /// watchlist when `ALLOWED_SYMBOLS` is unset (an empty allowlist means
    /// "no restriction" to the risk gate, not "trade nothing").
    pub symbols: Vec<String>,
    pub loop_seconds: u64,
    pub log_dir: PathBuf,
    pub lookback_bars: usize,
    pub alpaca_key_id: String,
    pub alpaca_secret_key: String,
    pub alpaca_base_url: String,
    pub research_enabled: bool,
    pub research_score_threshold: f64,
    pub http_bind_addr: String,
}

const DEFAULT_WATCHLIST: &[&str] = &["SPY", "QQQ", "AAPL", "MSFT", "NVDA"];
const DEFAULT_LOOKBACK_BARS: usize = 60;

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let symbols: Vec<String> = std::env::var("ALLOWED_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let symbols = if symbols.is_empty() {
            DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect()
        } else {
            symbols
        };

        let loop_seconds = std::env::var("LOOP_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        if loop_seconds == 0 {
            anyhow::bail!("LOOP_SECONDS must be positive");
        }

        let log_dir = PathBuf::from(
            std::env::var("LOG_DIR").unwrap_or_else(|_| "./data".to_string()),
        );

        let alpaca_key_id = std::env::var("ALPACA_KEY_ID").unwrap_or_default();
        let alpaca_secret_key = std::env::var("ALPACA_SECRET_KEY").unwrap_or_default();
        let alpaca_base_url = std::env::var("ALPACA_BASE_URL")
            .unwrap_or_else(|_| "https://paper-api.alpaca.markets".to_string());

        let research_enabled = std::env::var("RESEARCH_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let research_score_threshold = std::env::var("RESEARCH_SCORE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4.0);

        let http_bind_addr = std::env::var("HTTP_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(Self {
            symbols,
            loop_seconds,
            log_dir,
            lookback_bars: DEFAULT_LOOKBACK_BARS,
            alpaca_key_id,
            alpaca_secret_key,
            alpaca_base_url,
            research_enabled,
            research_score_threshold,
            http_bind_addr,
        })
    }
}

/// `signal-generator` owns the filter semantics but not its own env parsing
/// (it is a pure library crate); the orchestrator reads the toggles here.
pub fn filter_config_from_env() -> signal_generator::FilterConfig {
    let volume_filter_enabled = std::env::var("VOLUME_FILTER_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let volume_threshold = std::env::var("VOLUME_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1.5);
    let trend_filter_enabled = std::env::var("TREND_FILTER_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    signal_generator::FilterConfig {
        volume_filter_enabled,
        volume_threshold,
        trend_filter_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowed_symbols_falls_back_to_default_watchlist() {
        std::env::remove_var("ALLOWED_SYMBOLS");
        let cfg = AgentConfig::from_env().unwrap();
        assert_eq!(cfg.symbols, vec!["SPY", "QQQ", "AAPL", "MSFT", "NVDA"]);
    }

    #[test]
    fn zero_loop_seconds_is_rejected() {
        std::env::set_var("LOOP_SECONDS", "0");
        let result = AgentConfig::from_env();
        std::env::remove_var("LOOP_SECONDS");
        assert!(result.is_err());
    }
}
