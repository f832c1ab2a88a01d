pub mod client;
pub mod error;
pub mod prompt;

pub use client::{ChatClient, ChatClientConfig};
pub use error::{DecisionError, DecisionResult};

use serde::Deserialize;
use trading_core::{Decision, NoTrade, ResearchInsight, ScoredSignal, Thesis, TradeIntent};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawLlmResponse {
    NoTrade {
        reason: String,
    },
    Trade {
        signal_index: i64,
        symbol: Option<String>,
        side: Option<String>,
        notional_usd: f64,
        confidence: Option<f64>,
        thesis: Option<RawThesis>,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawThesis {
    summary: Option<String>,
}

pub struct DecisionAgent {
    client: ChatClient,
    max_dollars_per_trade: f64,
}

impl DecisionAgent {
    pub fn new(client: ChatClient, max_dollars_per_trade: f64) -> Self {
        Self {
            client,
            max_dollars_per_trade,
        }
    }

    /// Make exactly one decision from the ranked signal list. Exit-direction
    /// signals bypass the LLM entirely and are converted deterministically.
    pub async fn make_decision(
        &self,
        signals: &[ScoredSignal],
        research: &[ResearchInsight],
        portfolio: &trading_core::PortfolioState,
    ) -> Decision {
        if signals.is_empty() {
            return Decision::NoTrade(NoTrade {
                reason: "No signals generated".to_string(),
                signals_considered: Some(0),
            });
        }

        if let Some(exit) = signals.iter().find(|s| s.signal.direction.is_exit()) {
            return self.decision_for_exit(exit);
        }

        let system_prompt = prompt::SYSTEM_PROMPT;
        let user_prompt = prompt::build_user_prompt(signals, portfolio, research);

        match self.client.complete(system_prompt, &user_prompt).await {
            Ok(raw) => self.parse_and_validate(&raw, signals),
            Err(e) => {
                tracing::warn!(error = %e, "decision agent call failed");
                Decision::NoTrade(NoTrade {
                    reason: format!("Decision error: {}", e),
                    signals_considered: Some(signals.len()),
                })
            }
        }
    }

    fn decision_for_exit(&self, exit: &ScoredSignal) -> Decision {
        let signal = exit.signal.clone();
        Decision::Trade(TradeIntent {
            symbol: signal.symbol.clone(),
            side: signal.direction.broker_side().to_string(),
            notional_usd: self.max_dollars_per_trade,
            stop_price: signal.stop_price,
            exit_trigger: signal.exit_ref,
            thesis: Thesis {
                summary: signal.reason.clone(),
                system: Some(signal.system),
                breakout_days: None,
                atr_n: Some(signal.atr_n),
                stop_n: None,
                signal_score: Some(exit.total_score()),
                portfolio_fit: None,
                regime: None,
            },
            confidence: 0.95,
            signal,
        })
    }

    fn parse_and_validate(&self, raw: &str, signals: &[ScoredSignal]) -> Decision {
        let stripped = strip_code_fence(raw);
        let parsed: Result<RawLlmResponse, _> = serde_json::from_str(&stripped);

        match parsed {
            Ok(RawLlmResponse::NoTrade { reason }) => Decision::NoTrade(NoTrade {
                reason,
                signals_considered: Some(signals.len()),
            }),
            Ok(RawLlmResponse::Trade {
                signal_index,
                notional_usd,
                confidence,
                thesis,
                ..
            }) => {
                let index = signal_index.clamp(0, signals.len() as i64 - 1) as usize;
                let scored = &signals[index];
                let signal = scored.signal.clone();

                let notional = notional_usd.min(self.max_dollars_per_trade).max(0.0);

                Decision::Trade(TradeIntent {
                    symbol: signal.symbol.clone(),
                    side: signal.direction.broker_side().to_string(),
                    notional_usd: notional,
                    stop_price: signal.stop_price,
                    exit_trigger: signal.exit_ref,
                    thesis: Thesis {
                        summary: thesis
                            .and_then(|t| t.summary)
                            .unwrap_or_else(|| signal.reason.clone()),
                        system: Some(signal.system),
                        breakout_days: None,
                        atr_n: Some(signal.atr_n),
                        stop_n: None,
                        signal_score: Some(scored.total_score()),
                        portfolio_fit: None,
                        regime: None,
                    },
                    confidence: confidence.unwrap_or(0.6).clamp(0.0, 1.0),
                    signal,
                })
            }
            Err(e) => Decision::NoTrade(NoTrade {
                reason: format!("Parse error: {}", e),
                signals_considered: Some(signals.len()),
            }),
        }
    }
}

/// Strip a leading/trailing ``` code fence, tolerating an optional language
/// tag on the opening fence (e.g. ```json). Models are asked for bare JSON
/// but reliably wrap it anyway.
fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = trimmed.splitn(2, '\n').nth(1).unwrap_or("");
    without_open
        .rsplitn(2, "```")
        .nth(1)
        .unwrap_or(without_open)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::{
        PortfolioState, ScoreBreakdown, Signal, SignalDirection, TurtleSystem,
    };

    fn entry_scored(symbol: &str) -> ScoredSignal {
        ScoredSignal {
            signal: Signal {
                symbol: symbol.to_string(),
                direction: SignalDirection::Long,
                system: TurtleSystem::S2,
                entry_ref: 450.0,
                current_price: 456.0,
                atr_n: 5.0,
                stop_price: 446.0,
                exit_ref: 440.0,
                score_hint: 0.7,
                reason: "breakout".to_string(),
                volume_confirmed: None,
                trend_aligned: None,
                filters_passed: true,
                filter_notes: vec![],
            },
            breakdown: ScoreBreakdown {
                breakout_strength: 1.2,
                system_bonus: 1.0,
                momentum_per_n: 0.0,
                correlation_penalty: 0.0,
            },
        }
    }

    fn exit_scored(symbol: &str) -> ScoredSignal {
        let mut s = entry_scored(symbol);
        s.signal.direction = SignalDirection::ExitLong;
        s.signal.reason = "STOP LOSS hit".to_string();
        s
    }

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

    fn agent() -> DecisionAgent {
        DecisionAgent::new(
            ChatClient::new(ChatClientConfig {
                api_key: String::new(),
                base_url: "http://localhost:0".to_string(),
                model: "gpt-4o".to_string(),
                temperature: 0.3,
                max_tokens: 500,
            }),
            25.0,
        )
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"action\":\"no_trade\",\"reason\":\"x\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"action\":\"no_trade\",\"reason\":\"x\"}");
    }

    #[test]
    fn bare_json_passes_through_unchanged() {
        let raw = "{\"action\":\"no_trade\",\"reason\":\"x\"}";
        assert_eq!(strip_code_fence(raw), raw);
    }

    #[test]
    fn malformed_json_becomes_no_trade() {
        let agent = agent();
        let signals = vec![entry_scored("SPY")];
        let decision = agent.parse_and_validate("not json at all", &signals);
        match decision {
            Decision::NoTrade(nt) => assert!(nt.reason.starts_with("Parse error")),
            _ => panic!("expected NoTrade"),
        }
    }

    #[test]
    fn notional_is_clamped_to_cap_regardless_of_llm_value() {
        let agent = agent();
        let signals = vec![entry_scored("SPY")];
        let raw = r#"{"action":"trade","signal_index":0,"symbol":"ANYTHING","side":"sell","notional_usd":99999,"confidence":0.9,"thesis":{"summary":"go"}}"#;
        let decision = agent.parse_and_validate(raw, &signals);
        match decision {
            Decision::Trade(t) => {
                assert_eq!(t.notional_usd, 25.0);
                assert_eq!(t.symbol, "SPY"); // overridden from the signal, not the LLM
                assert_eq!(t.side, "buy"); // overridden from the signal direction
            }
            _ => panic!("expected Trade"),
        }
    }

    #[test]
    fn out_of_range_signal_index_is_clamped() {
        let agent = agent();
        let signals = vec![entry_scored("SPY")];
        let raw = r#"{"action":"trade","signal_index":99,"notional_usd":10,"confidence":0.5}"#;
        let decision = agent.parse_and_validate(raw, &signals);
        assert!(matches!(decision, Decision::Trade(_)));
    }

    #[tokio::test]
    async fn exit_signal_bypasses_llm_entirely() {
        let agent = agent();
        let signals = vec![exit_scored("SPY")];
        let decision = agent.make_decision(&signals, &[], &portfolio()).await;
        match decision {
            Decision::Trade(t) => {
                assert_eq!(t.side, "sell");
                assert!(t.confidence > 0.9);
            }
            _ => panic!("expected Trade"),
        }
    }

    #[tokio::test]
    async fn empty_signal_list_is_no_trade() {
        let agent = agent();
        let decision = agent.make_decision(&[], &[], &portfolio()).await;
        assert!(matches!(decision, Decision::NoTrade(_)));
    }
}
