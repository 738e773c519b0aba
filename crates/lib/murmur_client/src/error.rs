//! Client error types.

use thiserror::Error;

/// Failure of an API call, as seen by the coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The server answered 2xx but reported `success: false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            ClientError::Status(status.as_u16())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}
