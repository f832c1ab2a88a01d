use trading_core::{PortfolioState, ResearchInsight, ScoredSignal};

/// Fixed system prompt. Not templated per call — the hard rules never change
/// between ticks, only the signal/portfolio data in the user message does.
pub const SYSTEM_PROMPT: &str = "You are the decision layer of an automated Turtle-breakout \
equities trader. You will be given a ranked list of candidate signals and the current \
portfolio state. Rules, in order of priority:\n\
1. You may select at most one signal to trade this turn.\n\
2. You may only select a signal that appears in the provided list, by its index.\n\
3. You must never invent a symbol, side, or size that isn't implied by the selected signal.\n\
4. notional_usd must be a positive dollar amount; it will be clamped to the per-trade cap \
regardless of what you choose.\n\
5. If no signal looks attractive, or risk conditions are unclear, respond with no_trade.\n\
6. Prefer broad, liquid names over thin or highly correlated ones when scores are close.\n\
7. Respond with a single JSON object and nothing else, in one of exactly two shapes:\n\
   {\"action\": \"no_trade\", \"reason\": \"...\"}\n\
   {\"action\": \"trade\", \"signal_index\": <int>, \"symbol\": \"...\", \"side\": \"buy|sell\", \
\"notional_usd\": <number>, \"confidence\": <0-1>, \"thesis\": {\"summary\": \"...\"}}";

pub fn build_user_prompt(
    signals: &[ScoredSignal],
    portfolio: &PortfolioState,
    research: &[ResearchInsight],
) -> String {
    let mut out = String::new();
    out.push_str("Candidate signals:\n");
    for (i, s) in signals.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} {:?} system={:?} price={:.2} entry_ref={:.2} atr={:.2} stop={:.2} score={:.2}\n",
            i,
            s.signal.symbol,
            s.signal.direction,
            s.signal.system,
            s.signal.current_price,
            s.signal.entry_ref,
            s.signal.atr_n,
            s.signal.stop_price,
            s.total_score(),
        ));
    }

    out.push_str(&format!(
        "\nPortfolio: equity=${:.2} cash=${:.2} buying_power=${:.2} open_positions={} trades_today={} pnl_day={:.2}\n",
        portfolio.equity,
        portfolio.cash,
        portfolio.buying_power,
        portfolio.positions.len(),
        portfolio.trades_today,
        portfolio.pnl_day,
    ));

    if !research.is_empty() {
        out.push_str("\nResearch insights:\n");
        for r in research {
            out.push_str(&format!(
                "- {}: {} (sentiment={}, adjustment={:+.2})\n",
                r.symbol, r.summary, r.sentiment, r.confidence_adjustment
            ));
        }
    }

    out
}
