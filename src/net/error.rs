//! API error taxonomy and response-body unwrapping.
//!
//! ERROR HANDLING
//! ==============
//! Every failed call collapses into one `ApiError`. For HTTP failures the
//! display string is exactly what the backend reported in `detail`, so callers
//! can show it verbatim; when the body cannot be decoded the message falls back
//! to the status line.

use reqwest::StatusCode;
use serde_json::Value;

use crate::token::TokenStoreError;

/// Message used when a response carries no usable error detail.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Grepable error code and retryable hint for consumer-facing errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Errors produced by API client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connect, timeout, TLS, ...).
    #[error("request failed: {0}")]
    Transport(String),

    /// A success response promised JSON but the body did not match.
    #[error("{}", GENERIC_ERROR_MESSAGE)]
    Decode(String),

    /// The file handed to an upload operation was rejected before sending.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The persisted token could not be read.
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// HTTP status of the failed response, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the backend rejected the credential itself.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        self.status() == Some(401)
    }

    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        Self::Http { status: status.as_u16(), message: error_message(status, body) }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Http { .. } => "E_HTTP",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidUpload(_) => "E_INVALID_UPLOAD",
            Self::TokenStore(_) => "E_TOKEN_STORE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// BODY UNWRAPPING
// =============================================================================

/// Derive the user-facing message for a non-success response body.
///
/// - JSON with a string `detail`: that string.
/// - JSON with a list `detail` (validation errors): each `msg`, joined.
/// - Any other JSON: [`GENERIC_ERROR_MESSAGE`].
/// - Not JSON: `"HTTP {status} {reason}"`.
pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value
            .get("detail")
            .and_then(detail_message)
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_owned()),
        Err(_) => status_line(status),
    }
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
