// errors.rs
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum BandarmologyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Task execution failed: {0}")]
    TaskError(#[from] JoinError),

    #[error("Upstream API returned an error: {0}")]
    ApiError(String),

    #[error("Upstream rate limit hit: {0}")]
    RateLimited(String),

    #[error("Invalid data format: {0}")]
    InvalidDataFormat(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl BandarmologyError {
    /// Whether a retry at the orchestration boundary can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BandarmologyError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            BandarmologyError::ApiError(_) | BandarmologyError::RateLimited(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BandarmologyError>;
