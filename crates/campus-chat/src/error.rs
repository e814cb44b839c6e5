use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the chat core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rejected locally before any request was made, or a 400 from the backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request failed or timed out.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend could not resolve a duplicate chat by itself. Re-fetch the
    /// chat list and look the pair up again; do not retry creation.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Any other backend failure, including undecodable responses.
    #[error("Backend error: {0}")]
    UnknownBackend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, body)
        };
        match status {
            StatusCode::BAD_REQUEST => Self::Validation(detail),
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::CONFLICT => Self::Conflict(detail),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::Network(detail),
            _ => Self::UnknownBackend(detail),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status, "");
        }
        if e.is_decode() {
            return Self::UnknownBackend(format!("undecodable response: {}", e));
        }
        Self::Network(e.to_string())
    }
}
