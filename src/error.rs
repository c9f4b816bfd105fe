use thiserror::Error;

/// Failure of a single page or status fetch.
///
/// Errors are stored on cache entries and handed to the render surface, so
/// they carry rendered messages instead of the underlying transport types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("fixture error: {0}")]
    Fixture(String),
    #[error("mock queue empty")]
    MockQueueEmpty,
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return FetchError::Status { status: status.as_u16(), body: err.to_string() };
        }
        FetchError::Transport(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by the coordinator's pagination entry points. None of
/// them leave the feed in an unusable state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("no next page for the current filters")]
    NoNextPage,
    #[error("no filters committed yet")]
    NotCommitted,
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_retry_only_on_server_side() {
        let busy = FetchError::Status { status: 503, body: "busy".into() };
        let limited = FetchError::Status { status: 429, body: "slow down".into() };
        let bad = FetchError::Status { status: 400, body: "bad filters".into() };
        assert!(busy.is_retryable());
        assert!(limited.is_retryable());
        assert!(!bad.is_retryable());
        assert!(!FetchError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn status_error_display_includes_code() {
        let err = FetchError::Status { status: 404, body: "missing".into() };
        assert_eq!(format!("{err}"), "http error 404: missing");
        let wrapped: FeedError = err.into();
        assert_eq!(format!("{wrapped}"), "http error 404: missing");
    }
}
