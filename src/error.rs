//! Error types for the upstream proxies and the decision store.

use thiserror::Error;

/// Failure of a pass-through call to an upstream completion API.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The API key for `service` was not present at startup.
    #[error("{0} API key not configured")]
    MissingCredential(&'static str),

    #[error("{service} API error: {status}")]
    Upstream { service: &'static str, status: String },

    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0} returned no completion")]
    EmptyCompletion(&'static str),

    /// The model ignored the JSON-only instruction.
    #[error("model reply is not valid JSON: {0}")]
    MalformedReply(#[source] serde_json::Error),

    /// Valid JSON, wrong shape.
    #[error("model reply has an unexpected shape: {0}")]
    InvalidReply(String),
}

/// Failure of a decision store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
