use serde_json::Value;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// Marker the registry puts in `title` (or the older `error_type`) when a
/// sensitive operation needs the password to be verified again.
pub const FRESH_LOGIN_REQUIRED: &str = "fresh_login_required";

/// Message used when the user dismisses the verification prompt.
pub const VERIFICATION_CANCELED: &str = "Verification canceled";

/// Message used when the verification password is rejected.
pub const INVALID_VERIFICATION: &str = "Invalid verification credentials";

/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Http(HttpFailure),

    #[error("Unable to reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to fetch CSRF token: {0}")]
    CsrfToken(String),

    #[error("Failed to fetch bearer token: {0}")]
    BearerToken(#[source] BoxError),

    #[error("{0}")]
    FreshLoginCancelled(String),

    #[error("Queued request was dropped before it was replayed")]
    ReplayDropped,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// HTTP status of the failed response, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(failure) => Some(failure.status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::FreshLoginCancelled(_))
    }
}

/// A non-2xx response, kept whole so callers see exactly what the server sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl HttpFailure {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// True for a 401 whose body carries the fresh-login marker.
    #[must_use]
    pub fn is_fresh_login_required(&self) -> bool {
        if !self.is_unauthorized() {
            return false;
        }

        ["title", "error_type"].iter().any(|field| {
            self.body
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|value| value == FRESH_LOGIN_REQUIRED)
        })
    }

    /// Best human-readable message from the registry error body.
    #[must_use]
    pub fn message(&self) -> String {
        let detail = ["detail", "error_message", "message", "title"]
            .iter()
            .find_map(|field| self.body.get(field).and_then(Value::as_str));

        match (detail, &self.body) {
            (Some(detail), _) => sanitize_body(detail),
            (None, Value::String(text)) => sanitize_body(text),
            (None, Value::Null) => sanitize_body(""),
            (None, other) => sanitize_body(&other.to_string()),
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Request failed ({}): {}", self.status, self.message())
    }
}

/// Trims and truncates error bodies for user-facing messages.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
