use thiserror::Error;

/// The single error kind produced by the remote data gateway.
///
/// Timeouts, non-2xx statuses, and malformed payloads are deliberately not
/// distinguished; callers choose policy (swallow, retry, surface), not cause.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} responded with {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid payload from {endpoint}: {detail}")]
    Payload {
        endpoint: &'static str,
        detail: String,
    },
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
}

impl RemoteError {
    pub(crate) fn payload(endpoint: &'static str, detail: impl Into<String>) -> Self {
        RemoteError::Payload {
            endpoint,
            detail: detail.into(),
        }
    }
}
