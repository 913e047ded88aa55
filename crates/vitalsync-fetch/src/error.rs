use vitalsync_core::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// 401/403 from the API. Never retried.
    #[error("API rejected credentials ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Retryable failures persisted through every attempt.
    #[error("request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// A non-retryable, non-auth HTTP status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx with a body that cannot be used (bad JSON, missing timestamp).
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Auth { .. } => SyncError::Auth(err.to_string()),
            other => SyncError::ApiRequest(other.to_string()),
        }
    }
}
