//! Error types for the dork runner.

use thiserror::Error;

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, DorkError>;

/// Errors that abort a run or prevent it from starting.
#[derive(Error, Debug)]
pub enum DorkError {
    /// The niche term cannot be turned into queries.
    #[error("Invalid niche: {0}")]
    InvalidNiche(String),

    /// A query template is unusable.
    #[error("Invalid query template: {0}")]
    InvalidTemplate(String),

    /// Worker count must be at least one.
    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(i64),

    /// The proxy source was empty or unreachable.
    #[error("Proxy pool initialization failed: {0}")]
    PoolInit(String),

    /// No proxy is currently healthy.
    #[error("No healthy proxy available ({total} proxies, all quarantined)")]
    PoolExhausted { total: usize },

    /// Not a single query succeeded.
    #[error("Run failed: none of {attempted} attempted queries succeeded ({failed_workers} workers failed)")]
    RunFailed {
        attempted: usize,
        failed_workers: usize,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single outbound request. Recovered by the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the per-request timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Connection, TLS or protocol failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The proxy descriptor could not be used.
    #[error("invalid proxy: {0}")]
    Proxy(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Failure to turn a response payload into leads. Recovered by the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The payload was empty.
    #[error("empty payload")]
    Empty,

    /// The payload is a bot-check or CAPTCHA page.
    #[error("result page blocked by bot detection")]
    Blocked,

    /// The payload is not a result page.
    #[error("malformed payload: {0}")]
    Malformed(String),
}
