use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use trading_core::{atomic_read_json, atomic_write_json, PendingTrade, PendingTradeStatus};
use uuid::Uuid;

/// File-backed, read by the HTTP approval handlers and written by the tick's
/// execution stage concurrently — the in-process lock serialises the
/// read-modify-write around the atomic file write so the two sides can never
/// race into a lost update.
pub struct PendingTradeStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PendingTradeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load_all(&self) -> HashMap<Uuid, PendingTrade> {
        atomic_read_json(&self.path, HashMap::new())
    }

    fn save_all(&self, all: &HashMap<Uuid, PendingTrade>) -> anyhow::Result<()> {
        atomic_write_json(&self.path, all)?;
        Ok(())
    }

    pub fn insert(&self, trade: PendingTrade) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut all = self.load_all();
        all.insert(trade.id, trade);
        self.save_all(&all)
    }

    pub fn get(&self, id: Uuid) -> Option<PendingTrade> {
        let _guard = self.lock.lock().unwrap();
        self.load_all().get(&id).cloned()
    }

    pub fn update(&self, trade: PendingTrade) -> anyhow::Result<()> {
        self.insert(trade)
    }

    /// All still-pending trades, expiring any whose TTL has lapsed as a
    /// side effect (mirrors the approval API's own lazy expiry check).
    pub fn list_pending(&self) -> anyhow::Result<Vec<PendingTrade>> {
        let _guard = self.lock.lock().unwrap();
        let mut all = self.load_all();
        let now = Utc::now();
        let mut changed = false;
        let mut pending = Vec::new();

        for trade in all.values_mut() {
            if trade.status != PendingTradeStatus::Pending {
                continue;
            }
            if trade.is_expired(now) {
                trade.status = PendingTradeStatus::Expired;
                changed = true;
            } else {
                pending.push(trade.clone());
            }
        }

        if changed {
            self.save_all(&all)?;
        }

        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use trading_core::{
        Decision, PortfolioState, RiskResult, Signal, SignalDirection, Thesis, TradeIntent,
        TurtleSystem,
    };

    fn sample_trade() -> PendingTrade {
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
            reason: "breakout".into(),
            volume_confirmed: None,
            trend_aligned: None,
            filters_passed: true,
            filter_notes: vec![],
        };
        let intent = TradeIntent {
            symbol: "SPY".into(),
            side: "buy".into(),
            notional_usd: 25.0,
            stop_price: 446.0,
            exit_trigger: 440.0,
            thesis: Thesis {
                summary: "breakout".into(),
                system: Some(TurtleSystem::S2),
                breakout_days: None,
                atr_n: Some(5.0),
                stop_n: None,
                signal_score: None,
                portfolio_fit: None,
                regime: None,
            },
            confidence: 0.6,
            signal,
        };
        let portfolio = PortfolioState {
            equity: 100_000.0,
            cash: 100_000.0,
            buying_power: 100_000.0,
            positions: vec![],
            open_order_count: 0,
            trades_today: 0,
            pnl_day: 0.0,
        };
        PendingTrade {
            id: Uuid::new_v4(),
            intent: intent.clone(),
            portfolio_snapshot: portfolio,
            risk_result: RiskResult {
                allowed: true,
                notes: vec![],
                violations: vec![],
                original_decision: Decision::Trade(intent.clone()),
                final_decision: Decision::Trade(intent),
            },
            status: PendingTradeStatus::Pending,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(4),
            decided_at: None,
            decision_note: None,
            execution: None,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingTradeStore::new(dir.path().join("pending_trades.json"));
        let trade = sample_trade();
        let id = trade.id;
        store.insert(trade).unwrap();

        let loaded = store.get(id).unwrap();
        assert_eq!(loaded.intent.symbol, "SPY");
    }

    #[test]
    fn expired_trade_excluded_from_pending_list_and_marked() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingTradeStore::new(dir.path().join("pending_trades.json"));
        let mut trade = sample_trade();
        trade.expires_at = Utc::now() - Duration::hours(1);
        let id = trade.id;
        store.insert(trade).unwrap();

        let pending = store.list_pending().unwrap();
        assert!(pending.is_empty());

        let reloaded = store.get(id).unwrap();
        assert_eq!(reloaded.status, PendingTradeStatus::Expired);
    }
}
