use serde::Deserialize;
use thiserror::Error;

/// Failure of a single round-trip to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP {code} {text}")]
    Status {
        code: u16,
        text: String,
        body: String,
    },
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// `message` or `detail` carried in the body of an HTTP error response.
    pub fn server_message(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        server_message(body)
    }
}

/// Pulls `message` (preferred) or `detail` out of a JSON error body.
pub fn server_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    parsed
        .message
        .or(parsed.detail)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
