use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub quote: Option<Quote>,
    pub atr_20: Option<f64>,
    pub high_20: Option<f64>,
    pub low_20: Option<f64>,
    pub high_55: Option<f64>,
    pub low_55: Option<f64>,
    pub high_10: Option<f64>,
    pub low_10: Option<f64>,
    pub volume_avg_20: Option<f64>,
    pub current_volume: Option<i64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub trend_aligned: Option<bool>,
    pub volume_confirmed: Option<bool>,
}

impl SymbolData {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>, quote: Option<Quote>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
            quote,
            atr_20: None,
            high_20: None,
            low_20: None,
            high_55: None,
            low_55: None,
            high_10: None,
            low_10: None,
            volume_avg_20: None,
            current_volume: None,
            sma_50: None,
            sma_200: None,
            trend_aligned: None,
            volume_confirmed: None,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.quote
            .map(|q| q.last)
            .or_else(|| self.bars.last().map(|b| b.close))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub symbols: HashMap<String, SymbolData>,
    pub is_market_open: bool,
    pub data_available: bool,
    pub errors: Vec<String>,
}

impl MarketSnapshot {
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            symbols: HashMap::new(),
            is_market_open: false,
            data_available: false,
            errors: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Long,
    Short,
    ExitLong,
    ExitShort,
}

impl SignalDirection {
    pub fn is_exit(&self) -> bool {
        matches!(self, SignalDirection::ExitLong | SignalDirection::ExitShort)
    }

    pub fn is_long(&self) -> bool {
        matches!(self, SignalDirection::Long | SignalDirection::ExitShort)
    }

    /// The broker side needed to act on this signal: entries buy-to-open a
    /// long or sell-to-open a short; exits do the opposite.
    pub fn broker_side(&self) -> &'static str {
        match self {
            SignalDirection::Long => "buy",
            SignalDirection::Short => "sell",
            SignalDirection::ExitLong => "sell",
            SignalDirection::ExitShort => "buy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurtleSystem {
    S1,
    S2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: SignalDirection,
    pub system: TurtleSystem,
    pub entry_ref: f64,
    pub current_price: f64,
    pub atr_n: f64,
    pub stop_price: f64,
    pub exit_ref: f64,
    pub score_hint: f64,
    pub reason: String,
    pub volume_confirmed: Option<bool>,
    pub trend_aligned: Option<bool>,
    pub filters_passed: bool,
    pub filter_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub breakout_strength: f64,
    pub system_bonus: f64,
    pub momentum_per_n: f64,
    pub correlation_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSignal {
    pub signal: Signal,
    pub breakdown: ScoreBreakdown,
}

impl ScoredSignal {
    pub fn total_score(&self) -> f64 {
        3.0 * self.breakdown.breakout_strength + self.breakdown.system_bonus
            + self.breakdown.momentum_per_n
            - self.breakdown.correlation_penalty
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryCriteria {
    pub symbol: String,
    pub stop_price: f64,
    pub exit_ref: f64,
    pub atr_at_entry: f64,
    pub system: TurtleSystem,
    pub entered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub qty: f64,
    pub avg_entry_price: f64,
    pub market_value: f64,
    pub unrealized_pl: f64,
    pub unrealized_plpc: f64,
    pub entry_criteria: Option<EntryCriteria>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.qty > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub equity: f64,
    pub cash: f64,
    pub buying_power: f64,
    pub positions: Vec<Position>,
    pub open_order_count: usize,
    pub trades_today: usize,
    pub pnl_day: f64,
}

impl PortfolioState {
    pub fn position_for(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thesis {
    pub summary: String,
    pub system: Option<TurtleSystem>,
    pub breakout_days: Option<u32>,
    pub atr_n: Option<f64>,
    pub stop_n: Option<f64>,
    pub signal_score: Option<f64>,
    pub portfolio_fit: Option<String>,
    pub regime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: String,
    pub notional_usd: f64,
    pub signal: Signal,
    pub stop_price: f64,
    pub exit_trigger: f64,
    pub thesis: Thesis,
    pub confidence: f64,
}

impl TradeIntent {
    pub fn is_exit(&self) -> bool {
        self.signal.direction.is_exit()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoTrade {
    pub reason: String,
    pub signals_considered: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Trade(TradeIntent),
    NoTrade(NoTrade),
}

impl Decision {
    pub fn no_trade(reason: impl Into<String>) -> Self {
        Decision::NoTrade(NoTrade {
            reason: reason.into(),
            signals_considered: None,
        })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Decision::Trade(t) if t.is_exit())
    }

    pub fn as_trade(&self) -> Option<&TradeIntent> {
        match self {
            Decision::Trade(t) => Some(t),
            Decision::NoTrade(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResult {
    pub allowed: bool,
    pub notes: Vec<String>,
    pub violations: Vec<String>,
    pub original_decision: Decision,
    pub final_decision: Decision,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub broker_order_id: Option<String>,
    pub status: String,
    pub message: String,
    pub filled_qty: Option<f64>,
    pub filled_avg_price: Option<f64>,
}

impl OrderResult {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            broker_order_id: None,
            status: "skipped".to_string(),
            message: message.into(),
            filled_qty: None,
            filled_avg_price: None,
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            broker_order_id: None,
            status: "blocked".to_string(),
            message: message.into(),
            filled_qty: None,
            filled_avg_price: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingTradeStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTrade {
    pub id: Uuid,
    pub intent: TradeIntent,
    pub portfolio_snapshot: PortfolioState,
    pub risk_result: RiskResult,
    pub status: PendingTradeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub execution: Option<OrderResult>,
}

impl PendingTrade {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Loop / audit records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchInsight {
    pub symbol: String,
    pub query: String,
    pub summary: String,
    pub sentiment: String,
    pub key_factors: Vec<String>,
    pub risk_factors: Vec<String>,
    pub citations: Vec<String>,
    pub confidence_adjustment: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopResult {
    pub loop_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub snapshot: MarketSnapshot,
    pub signals: Vec<ScoredSignal>,
    pub portfolio: Option<PortfolioState>,
    pub decision: Decision,
    pub risk_result: Option<RiskResult>,
    pub order_result: Option<OrderResult>,
    pub pending_trade: Option<PendingTrade>,
    pub research: HashMap<String, ResearchInsight>,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl LoopResult {
    pub fn new(snapshot: MarketSnapshot, decision: Decision) -> Self {
        Self {
            loop_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            snapshot,
            signals: Vec::new(),
            portfolio: None,
            decision,
            risk_result: None,
            order_result: None,
            pending_trade: None,
            research: HashMap::new(),
            duration_ms: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub qty: f64,
    pub return_pct: f64,
    pub pnl_usd: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn is_win(&self) -> bool {
        self.pnl_usd > 0.0
    }
}

// ---------------------------------------------------------------------------
// Tool bridge cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ToolCacheEntry {
    pub value: serde_json::Value,
    pub inserted_at: std::time::Instant,
    pub expires_at: std::time::Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitBreakerStatus {
    Normal,
    Warning,
    Halted,
}

impl CircuitBreakerStatus {
    pub fn multiplier(&self, reduction_factor: f64) -> f64 {
        match self {
            CircuitBreakerStatus::Normal => 1.0,
            CircuitBreakerStatus::Warning => reduction_factor,
            CircuitBreakerStatus::Halted => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_signals_compute_broker_side_correctly() {
        assert_eq!(SignalDirection::Long.broker_side(), "buy");
        assert_eq!(SignalDirection::ExitLong.broker_side(), "sell");
        assert_eq!(SignalDirection::Short.broker_side(), "sell");
        assert_eq!(SignalDirection::ExitShort.broker_side(), "buy");
    }

    #[test]
    fn total_score_combines_breakdown_additively() {
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
            reason: "S2 breakout".into(),
            volume_confirmed: None,
            trend_aligned: None,
            filters_passed: true,
            filter_notes: vec![],
        };
        let scored = ScoredSignal {
            signal,
            breakdown: ScoreBreakdown {
                breakout_strength: 1.2,
                system_bonus: 1.0,
                momentum_per_n: 0.4,
                correlation_penalty: 0.5,
            },
        };
        // 3*1.2 + 1.0 + 0.4 - 0.5 = 4.5
        assert!((scored.total_score() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn circuit_breaker_multiplier_matches_status() {
        assert_eq!(CircuitBreakerStatus::Normal.multiplier(0.5), 1.0);
        assert_eq!(CircuitBreakerStatus::Warning.multiplier(0.5), 0.5);
        assert_eq!(CircuitBreakerStatus::Halted.multiplier(0.5), 0.0);
    }
}
