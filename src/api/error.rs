//! API error types and user-facing messages.

use thiserror::Error;

/// Errors that can occur when talking to the REST API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, or timeout: no HTTP status
    #[error("network error: {0}")]
    Network(String),
    /// Non-success HTTP response; `message` comes from the body when present
    #[error("HTTP {status}{}", .message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default())]
    Http {
        status: u16,
        message: Option<String>,
    },
    /// Response arrived but could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn http(status: u16, message: Option<String>) -> Self {
        ApiError::Http { status, message }
    }

    /// HTTP status, with network failures reported as 0
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network(_) => Some(0),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Decode(_) => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::Http { status, .. } if (400..500).contains(status))
    }

    /// Transient failures worth retrying on idempotent reads
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Decode(_) => false,
        }
    }

    /// Detail message carried by the error, if any
    pub fn message(&self) -> Option<String> {
        match self {
            ApiError::Network(msg) | ApiError::Decode(msg) => Some(msg.clone()),
            ApiError::Http { message, .. } => message.clone(),
        }
    }

    /// Message suitable for showing to the person at the console
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Unable to connect to the server. Please check your connection.".to_string()
            }
            ApiError::Http { status: 401, .. } => {
                "You are not authorized to perform this action.".to_string()
            }
            ApiError::Http { status: 403, .. } => {
                "Access denied. You do not have permission.".to_string()
            }
            ApiError::Http { status: 404, .. } => {
                "The requested resource was not found.".to_string()
            }
            ApiError::Http { status, .. } if *status >= 500 => {
                "A server error occurred. Please try again later.".to_string()
            }
            ApiError::Http {
                message: Some(message),
                ..
            } => message.clone(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::http(status.as_u16(), None)
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
