//! Error types for the fetch client

use std::time::Duration;

use compact_str::{CompactString, ToCompactString, format_compact};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Raw failure of a single request attempt
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Network failure: {message}")]
    Network { message: CompactString },

    #[error("Request timeout after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Rate limit exceeded ({status})")]
    RateLimit { status: u16, retry_after: Option<Duration> },

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: CompactString },

    #[error("Failed to parse response from {endpoint}: {message}")]
    JsonParse { endpoint: CompactString, message: CompactString },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: CompactString },

    #[error("Configuration error: {0}")]
    Config(CompactString),

    #[error("Invalid configuration for {field}: {message}")]
    ConfigValidation { field: CompactString, message: CompactString },
}

/// Coarse category used to pick the caller-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    Timeout,
    Network,
    Server,
    Client,
    Decode,
    Other,
}

impl ClientError {
    pub fn network(message: impl std::fmt::Display) -> Self {
        Self::Network { message: message.to_compact_string() }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    pub fn rate_limit(status: u16, retry_after: Option<Duration>) -> Self {
        Self::RateLimit { status, retry_after }
    }

    pub fn status(status: u16, reason: impl Into<CompactString>) -> Self {
        Self::Status { status, reason: reason.into() }
    }

    pub fn json_parse(endpoint: impl Into<CompactString>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            endpoint: endpoint.into(),
            message: format_compact!("{source}"),
        }
    }

    pub fn invalid_url(url: impl Into<CompactString>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn config(message: impl Into<CompactString>) -> Self {
        Self::Config(message.into())
    }

    pub fn config_validation(
        field: impl Into<CompactString>,
        message: impl Into<CompactString>,
    ) -> Self {
        Self::ConfigValidation { field: field.into(), message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
            Self::Status { status, .. } if *status >= 500 => ErrorKind::Server,
            Self::Status { status, .. } if *status >= 400 => ErrorKind::Client,
            Self::JsonParse { .. } => ErrorKind::Decode,
            Self::InvalidUrl { .. } => ErrorKind::Client,
            Self::Status { .. } | Self::Config(_) | Self::ConfigValidation { .. } => {
                ErrorKind::Other
            },
        }
    }

    /// HTTP status of the response that caused this error, if there was one
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RateLimit { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Normalized error handed to callers once every attempt has failed
///
/// `message` is meant for display; `detail` keeps the underlying error text.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: CompactString,
    pub detail: CompactString,
    pub status: Option<u16>,
    pub is_rate_limit: bool,
    pub retry_after: Option<Duration>,
    /// Set when cached data was served in place of this error
    pub is_cached: bool,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<CompactString>) -> Self {
        let message = message.into();
        Self {
            kind,
            detail: message.clone(),
            message,
            status: None,
            is_rate_limit: kind == ErrorKind::RateLimit,
            retry_after: None,
            is_cached: false,
        }
    }

    pub fn cached(mut self) -> Self {
        self.is_cached = true;
        self
    }
}

impl From<&ClientError> for ApiError {
    fn from(err: &ClientError) -> Self {
        let kind = err.kind();
        let message: CompactString = match kind {
            ErrorKind::RateLimit => "API rate limit reached. Using cached data if available.".into(),
            ErrorKind::Timeout => "Request timed out. Please check your connection.".into(),
            ErrorKind::Network => "Network error. Please check your internet connection.".into(),
            ErrorKind::Server => "Server error. The service may be temporarily unavailable.".into(),
            ErrorKind::Client => "Request failed. The resource may not be available.".into(),
            ErrorKind::Decode => "Received an unreadable response from the server.".into(),
            ErrorKind::Other => err.to_compact_string(),
        };
        let retry_after = match err {
            ClientError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        };

        Self {
            kind,
            message,
            detail: err.to_compact_string(),
            status: err.http_status(),
            is_rate_limit: kind == ErrorKind::RateLimit,
            retry_after,
            is_cached: false,
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_map_to_kinds() {
        assert_eq!(ClientError::status(503, "Service Unavailable").kind(), ErrorKind::Server);
        assert_eq!(ClientError::status(404, "Not Found").kind(), ErrorKind::Client);
        assert_eq!(ClientError::rate_limit(403, None).kind(), ErrorKind::RateLimit);
        assert_eq!(ClientError::timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);
        assert_eq!(ClientError::network("connection refused").kind(), ErrorKind::Network);
    }

    #[test]
    fn test_api_error_message_differs_from_raw_text() {
        let raw = ClientError::status(500, "Internal Server Error");
        let api = ApiError::from(&raw);

        assert_eq!(api.status, Some(500));
        assert!(!api.is_rate_limit);
        assert_ne!(api.message, api.detail);
        assert_eq!(api.detail, "HTTP 500: Internal Server Error");
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let api = ApiError::from(ClientError::rate_limit(429, Some(Duration::from_secs(2))));

        assert!(api.is_rate_limit);
        assert_eq!(api.status, Some(429));
        assert_eq!(api.retry_after, Some(Duration::from_secs(2)));
        assert!(!api.is_cached);
        assert!(api.cached().is_cached);
    }

    #[test]
    fn test_timeout_display() {
        let err = ClientError::timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Request timeout after 250ms");
    }
}
