use std::collections::HashSet;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "profit", "growth", "beat", "upgrade",
    "outperform", "strong", "positive", "rise", "increase", "breakthrough",
    "momentum", "buy", "optimistic", "record", "high", "advance", "tailwind",
    "upside", "recovery", "rebound", "robust", "accelerating", "raised",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "fall", "plunge", "crash", "miss", "downgrade",
    "underperform", "weak", "negative", "drop", "decrease", "concern", "risk",
    "disappoint", "slump", "sell", "warning", "pessimistic", "low", "retreat",
    "fear", "headwind", "lawsuit", "investigation", "downside", "overvalued",
    "lowered", "volatility",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "isn't", "aren't", "wasn't", "won't", "doesn't",
];

/// Raw sentiment magnitude from a simple bag-of-words scan. Not normalized;
/// callers gate on magnitude before surfacing an insight at all.
pub fn raw_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || ",;.!?".contains(c))
        .filter(|w| !w.is_empty())
        .collect();

    let positive: HashSet<&str> = POSITIVE_WORDS.iter().copied().collect();
    let negative: HashSet<&str> = NEGATIVE_WORDS.iter().copied().collect();
    let negation: HashSet<&str> = NEGATION_WORDS.iter().copied().collect();

    let negation_positions: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| negation.contains(*w))
        .map(|(i, _)| i)
        .collect();

    let mut score = 0i32;
    for (i, word) in words.iter().enumerate() {
        let is_pos = positive.contains(*word);
        let is_neg = negative.contains(*word);
        if !is_pos && !is_neg {
            continue;
        }
        let negated = negation_positions.iter().any(|&p| p < i && i - p <= 3);
        if is_pos {
            score += if negated { -1 } else { 1 };
        } else {
            score += if negated { 1 } else { -1 };
        }
    }
    score as f64
}

/// Maps raw score to a sentiment label and a confidence adjustment fed into
/// signal scoring, scaled to roughly [-0.2, 0.2].
pub fn classify(raw: f64) -> (&'static str, f64) {
    let adjustment = (raw / 10.0).clamp(-0.2, 0.2);
    let label = if raw > 1.0 {
        "bullish"
    } else if raw < -1.0 {
        "bearish"
    } else {
        "neutral"
    };
    (label, adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_words_score_positive() {
        let score = raw_score("Analysts are bullish after the company's strong earnings beat.");
        assert!(score > 0.0);
    }

    #[test]
    fn negated_positive_word_flips_sign() {
        let score = raw_score("This is not a strong quarter.");
        assert!(score < 0.0);
    }

    #[test]
    fn classify_gates_on_magnitude() {
        let (label, adj) = classify(0.5);
        assert_eq!(label, "neutral");
        assert!(adj.abs() < 0.2);
    }
}
