//! Error types for the GridHub wire layer.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while talking to the GridHub service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{0}")]
    Status(StatusError),

    /// The request never completed (DNS, TLS, connection reset, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A payload could not be encoded or decoded.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured base URL is not a valid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The operation needs read/write credentials but only an API key was
    /// supplied. API keys grant read access to public documents, nothing more.
    #[error("{operation} requires read/write credentials (API keys are read-only)")]
    ReadOnly { operation: &'static str },
}

impl ApiError {
    /// HTTP status code, if this error came from a server reply.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status(s) => Some(s.status),
            _ => None,
        }
    }
}

/// A non-2xx reply, with the remote error body attached when it was parseable.
#[derive(Debug)]
pub struct StatusError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code from the response body (e.g. `PERMISSION_DENIED`).
    pub code: Option<String>,
    /// Human-readable message from the response body, or the raw body.
    pub message: String,
    /// Extra guidance attached by the client (e.g. for API-key 403s).
    pub hint: Option<String>,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " — {hint}")?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = StatusError {
            status: 404,
            code: Some("NOT_FOUND".into()),
            message: "Requested entity was not found.".into(),
            hint: None,
        };
        assert_eq!(
            err.to_string(),
            "HTTP 404 (NOT_FOUND): Requested entity was not found."
        );

        let err = StatusError {
            status: 500,
            code: None,
            message: "boom".into(),
            hint: Some("try again".into()),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom — try again");
    }
}
