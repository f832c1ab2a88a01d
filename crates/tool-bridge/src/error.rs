use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolBridgeError {
    #[error("tool call failed after retries: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("tool '{tool}' returned non-retryable status {status}")]
    NonRetryable { tool: String, status: u16 },

    #[error("tool call exhausted retries: {tool}")]
    RetriesExhausted { tool: String },
}

pub type ToolBridgeResult<T> = Result<T, ToolBridgeError>;
