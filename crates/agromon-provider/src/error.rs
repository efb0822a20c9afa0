/// Errors that can occur when fetching or normalizing upstream forecasts.
///
/// # Examples
///
/// ```rust
/// use agromon_provider::error::ProviderError;
///
/// let err = ProviderError::MalformedPayload("hourly.precipitation is missing".to_string());
/// assert!(err.to_string().contains("precipitation"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Non-2xx status from the forecast API. Transient from the caller's
    /// point of view: safe to retry with backoff, never retried here.
    #[error("forecast API HTTP error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// An underlying HTTP transport error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider broke its own payload contract (missing required hourly
    /// array, mismatched array lengths, unparseable timestamps). Logged and
    /// surfaced, never retried.
    #[error("malformed forecast payload: {0}")]
    MalformedPayload(String),

    /// JSON decode failure on the response body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
