use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when calling the commerce backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error status.
    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing, expired or insufficient credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL cannot be joined with a request path.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// Build an error from a non-success response.
    ///
    /// Bodies shaped like `{"message": "..."}` (or `{"error": "..."}`) are
    /// surfaced as the message; anything else is truncated and passed on.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
            error: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                let trimmed: String = body.trim().chars().take(200).collect();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    trimmed
                }
            });

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Message safe to show to the user in a flash notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { status, message } if *status < 500 => message.clone(),
            Self::Unauthorized(_) => "Please sign in again.".to_string(),
            Self::NotFound(_) => "The requested item was not found.".to_string(),
            _ => "The store service is unavailable. Please try again shortly.".to_string(),
        }
    }

    /// True for 401/403 responses.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_is_surfaced() {
        let err = BackendError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Insufficient stock for Cafe Molido"}"#,
        );
        assert!(matches!(err, BackendError::Api { status: 422, .. }));
        assert_eq!(err.user_message(), "Insufficient stock for Cafe Molido");
    }

    #[test]
    fn test_status_mapping() {
        assert!(BackendError::from_response(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(BackendError::from_response(StatusCode::FORBIDDEN, "{}").is_unauthorized());
        assert!(matches!(
            BackendError::from_response(StatusCode::NOT_FOUND, r#"{"error":"no product"}"#),
            BackendError::NotFound(m) if m == "no product"
        ));
    }

    #[test]
    fn test_server_errors_are_hidden_from_users() {
        let err = BackendError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html>stack trace</html>",
        );
        assert_eq!(
            err.to_string(),
            "backend error (500): <html>stack trace</html>"
        );
        assert!(!err.user_message().contains("stack"));
    }

    #[test]
    fn test_empty_body_uses_reason() {
        let err = BackendError::from_response(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.to_string(), "backend error (502): Bad Gateway");
    }
}
