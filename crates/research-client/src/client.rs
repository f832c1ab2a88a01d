use crate::error::{ResearchError, ResearchResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResearchClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ResearchClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("PERPLEXITY_API_KEY").unwrap_or_default(),
            base_url: std::env::var("PERPLEXITY_BASE_URL")
                .unwrap_or_else(|_| "https://api.perplexity.ai".to_string()),
            model: std::env::var("RESEARCH_MODEL")
                .unwrap_or_else(|_| "sonar".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    citations: Option<Vec<String>>,
}

pub struct ResearchApiClient {
    http: reqwest::Client,
    cfg: ResearchClientConfig,
}

pub struct RawResearch {
    pub content: String,
    pub citations: Vec<String>,
}

impl ResearchApiClient {
    pub fn new(cfg: ResearchClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client builds");
        Self { http, cfg }
    }

    pub async fn research_symbol(&self, symbol: &str) -> ResearchResult<RawResearch> {
        let prompt = format!(
            "Give a brief current outlook for the stock {symbol}: recent catalysts, \
            sentiment among traders, and the single biggest risk over the next week. \
            Three sentences or fewer."
        );
        let request = ChatRequest {
            model: self.cfg.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.cfg.base_url))
            .bearer_auth(&self.cfg.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let citations = response.citations.unwrap_or_default();
        response
            .choices
            .into_iter()
            .next()
            .map(|c| RawResearch {
                content: c.message.content,
                citations,
            })
            .ok_or(ResearchError::EmptyResponse)
    }
}
