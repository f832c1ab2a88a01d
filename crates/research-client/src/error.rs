use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("research API returned no choices")]
    EmptyResponse,
}

pub type ResearchResult<T> = Result<T, ResearchError>;
