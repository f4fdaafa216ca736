use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The server refused the request as invalid, e.g. an email already registered.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unauthorized - logged out")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No access token is stored, so nothing was sent.
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Longest server message carried into an error
const MAX_MESSAGE_LENGTH: usize = 300;

impl ApiError {
    /// Human-readable message from an error body.
    ///
    /// The backend answers errors with `{"error": "..."}`, sometimes
    /// `{"error": {"message": "..."}}` or `{"message": "..."}`. Anything else
    /// is passed through as text, shortened.
    fn server_message(body: &str) -> String {
        let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            let error = json.get("error");
            error
                .and_then(Value::as_str)
                .or_else(|| error.and_then(|e| e.get("message")).and_then(Value::as_str))
                .or_else(|| json.get("message").and_then(Value::as_str))
                .map(str::to_string)
        });

        let message = from_json.unwrap_or_else(|| body.trim().to_string());
        if message.len() <= MAX_MESSAGE_LENGTH {
            return message;
        }
        let mut end = MAX_MESSAGE_LENGTH;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &message[..end])
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::server_message(body);
        let code = status.as_u16();
        match code {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            400..=499 => ApiError::Rejected { status: code, message },
            500..=599 => ApiError::ServerError { status: code, message },
            _ => ApiError::InvalidResponse(format!("Unexpected status {}: {}", status, message)),
        }
    }

    /// Whether the server looked at the request and said no, as opposed to
    /// the request never getting an answer.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected { .. } | ApiError::Forbidden(_))
    }
}
