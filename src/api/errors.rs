//! Comments API error type and user-facing formatting helpers.

use std::error::Error as StdError;
use thiserror::Error;

/// Result type for comments API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by a comments API collaborator.
///
/// The sync engine treats every variant as an opaque failure; the variants
/// only exist so the message shown to the user is useful.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no session token; sign in first")]
    Unauthenticated,
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    /// Builds a status error from a non-success response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            message: normalize_message(&extract_message(body)).to_owned(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthenticated => true,
            Self::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// Formats an API error, including its source chain, into one line.
pub fn format_api_error(error: &ApiError) -> String {
    format_error_chain(error)
}

fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_owned();
    };

    if let Some(message) = value.get("message").and_then(serde_json::Value::as_str) {
        return message.to_owned();
    }

    if let Some(messages) = value.get("message").and_then(serde_json::Value::as_array) {
        return messages
            .iter()
            .filter_map(serde_json::Value::as_str)
            .collect::<Vec<_>>()
            .join("; ");
    }

    if let Some(error) = value.get("error").and_then(serde_json::Value::as_str) {
        return error.to_owned();
    }

    value.to_string()
}

fn normalize_message(message: &str) -> &str {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        "comments API error"
    } else {
        trimmed
    }
}

fn format_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut current = Some(error);
    let mut parts: Vec<String> = Vec::new();

    while let Some(err) = current {
        let text = err.to_string();
        if !text.is_empty() && !parts.iter().any(|part| part.contains(&text)) {
            parts.push(text);
        }
        current = err.source();
    }

    if parts.is_empty() {
        "unknown error".to_owned()
    } else {
        parts.join(": ")
    }
}
