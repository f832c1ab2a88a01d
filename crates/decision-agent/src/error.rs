use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("LLM returned no choices")]
    EmptyResponse,

    #[error("failed to parse decision JSON: {0}")]
    ParseError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DecisionResult<T> = Result<T, DecisionError>;
