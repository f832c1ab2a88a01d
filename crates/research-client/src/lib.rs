pub mod client;
pub mod error;
pub mod sentiment;

pub use client::{ResearchApiClient, ResearchClientConfig};
pub use error::{ResearchError, ResearchResult};

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use trading_core::ResearchInsight;

/// Minimum |raw sentiment score| required to surface a research insight at
/// all. Below this, the result is treated as noise and dropped.
pub const SCORE_THRESHOLD: f64 = 4.0;

pub struct ResearchHook {
    client: ResearchApiClient,
    cache: DashMap<(String, NaiveDate), Option<ResearchInsight>>,
    threshold: f64,
}

impl ResearchHook {
    pub fn new(client: ResearchApiClient) -> Self {
        Self {
            client,
            cache: DashMap::new(),
            threshold: SCORE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Fetch (or reuse a cached) research insight for a symbol. Never fails
    /// the caller's tick: any HTTP error or a sub-threshold sentiment score
    /// both resolve to `None`.
    pub async fn research(&self, symbol: &str) -> Option<ResearchInsight> {
        let today = Utc::now().date_naive();
        let key = (symbol.to_string(), today);

        if let Some(entry) = self.cache.get(&key) {
            return entry.clone();
        }

        let insight = self.fetch_and_classify(symbol, today).await;
        self.cache.insert(key, insight.clone());
        insight
    }

    async fn fetch_and_classify(&self, symbol: &str, today: NaiveDate) -> Option<ResearchInsight> {
        let raw = match self.client.research_symbol(symbol).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "research lookup failed, continuing without it");
                return None;
            }
        };

        let score = sentiment::raw_score(&raw.content);
        if score.abs() < self.threshold {
            tracing::debug!(symbol, score, "research sentiment below surfacing threshold");
            return None;
        }

        let (label, adjustment) = sentiment::classify(score);
        Some(ResearchInsight {
            symbol: symbol.to_string(),
            query: format!("outlook for {symbol}"),
            summary: raw.content,
            sentiment: label.to_string(),
            key_factors: Vec::new(),
            risk_factors: Vec::new(),
            citations: raw.citations,
            confidence_adjustment: adjustment,
            timestamp: today.and_hms_opt(0, 0, 0).unwrap().and_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_scoped_to_symbol_and_date() {
        let cache: DashMap<(String, NaiveDate), Option<ResearchInsight>> = DashMap::new();
        let today = Utc::now().date_naive();
        cache.insert(("SPY".to_string(), today), None);
        assert!(cache.contains_key(&("SPY".to_string(), today)));
        assert!(!cache.contains_key(&("QQQ".to_string(), today)));
    }
}
