//! Error type for the authenticated API client

use std::time::Duration;

/// Fallback message when neither the server nor the transport said anything useful.
pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// Failure of an API call.
///
/// `Clone` so a single refresh failure can be handed to every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure: connection refused, reset, TLS, ...
    #[error("network error: {0}")]
    Network(String),

    /// 401 that was not (or could no longer be) recovered by a refresh.
    #[error("401 Unauthorized for {path}: {message}")]
    Unauthorized { path: String, message: String },

    /// Non-success status other than a recoverable 401.
    #[error("HTTP {status} for {path}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },

    /// A refresh was needed but no refresh token is stored.
    #[error("not logged in: no refresh token stored")]
    Unauthenticated,

    /// The `/auth/refresh` call itself failed.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("session refresh timed out after {0:?}")]
    RefreshTimeout(Duration),

    /// The in-flight refresh was abandoned before settling.
    #[error("session refresh was cancelled")]
    RefreshCancelled,

    #[error("invalid response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("could not encode request body for {path}: {message}")]
    Encode { path: String, message: String },
}

impl ApiError {
    /// Whether this error tore down the session (refresh exhausted).
    /// A cancelled refresh leaves the stored tokens in place.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthenticated | ApiError::RefreshFailed(_) | ApiError::RefreshTimeout(_)
        )
    }

    /// Human-readable message for display: the server's `msg` when present.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized { message, .. }
            | ApiError::Status { message, .. }
                if !message.is_empty() =>
            {
                message.clone()
            }
            ApiError::Unauthorized { .. } | ApiError::Status { .. } => GENERIC_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Whether `err`, or anything it wraps, is an [`ApiError`] that ended the session.
pub fn ends_session(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_session_lost)
}

/// Extract the backend's error message from a response body.
///
/// The backend answers errors with `{"msg": "..."}`, or `{"errors": {...}}`
/// for validation failures.
pub fn server_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() || trimmed.len() > 200 {
            GENERIC_MESSAGE.to_string()
        } else {
            trimmed.to_string()
        };
    };

    if let Some(msg) = value.get("msg").and_then(|m| m.as_str()) {
        return msg.to_string();
    }
    if let Some(errors) = value.get("errors") {
        return format!("validation failed: {}", errors);
    }
    GENERIC_MESSAGE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_prefers_msg() {
        assert_eq!(server_message(r#"{"msg":"Not found"}"#), "Not found");
    }

    #[test]
    fn test_server_message_validation_errors() {
        let msg = server_message(r#"{"errors":{"title":["Missing data"]}}"#);
        assert!(msg.starts_with("validation failed"));
        assert!(msg.contains("title"));
    }

    #[test]
    fn test_server_message_fallbacks() {
        assert_eq!(server_message(""), GENERIC_MESSAGE);
        assert_eq!(server_message("{}"), GENERIC_MESSAGE);
        assert_eq!(server_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_user_message() {
        let err = ApiError::Status {
            status: 400,
            path: "/tasks".into(),
            message: "Email already registered".into(),
        };
        assert_eq!(err.user_message(), "Email already registered");
        assert_eq!(
            ApiError::Network("connection refused".into()).user_message(),
            "network error: connection refused"
        );
        assert!(ApiError::RefreshTimeout(Duration::from_secs(1)).is_session_lost());
        assert!(!ApiError::RefreshCancelled.is_session_lost());
        assert!(!err.is_session_lost());
    }

    #[test]
    fn test_ends_session_looks_through_context() {
        use anyhow::Context;

        let lost: anyhow::Result<()> = Err(ApiError::RefreshFailed("HTTP 401".into()))
            .context("Failed to list tasks");
        assert!(ends_session(&lost.unwrap_err()));

        let missing = anyhow::Error::new(ApiError::Status {
            status: 404,
            path: "/tasks/9".into(),
            message: "Not found".into(),
        });
        assert!(!ends_session(&missing));
        assert!(!ends_session(&anyhow::anyhow!("config unreadable")));
    }
}
