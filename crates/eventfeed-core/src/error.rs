//! Shared error types for the eventfeed workspace.
//!
//! Each error carries a `user_message()` that is safe to show to site
//! visitors; the `Display` text keeps the detail for logs.

use thiserror::Error;

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "The calendar source could not be reached.",
            NetworkError::Timeout => "The calendar source took too long to respond.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The calendar source is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The calendar source rejected the request.",
            NetworkError::InvalidResponse(_) => "The calendar source sent an unexpected response.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Settings store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Settings file IO failed: {0}")]
    Io(String),

    #[error("Settings file is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to serialize settings: {0}")]
    Serialize(String),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "Stored settings could not be accessed.",
            StoreError::Corrupt(_) => "Stored settings are damaged. Re-save them in the admin area.",
            StoreError::Serialize(_) => "Settings could not be saved.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() || self.is_body() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ParseError("expected `=`".into());
        assert!(err.to_string().contains("expected `=`"));
        assert!(err.user_message().contains("malformed"));
        assert_ne!(
            err.user_message(),
            ConfigError::Invalid("x".into()).user_message()
        );
    }

    #[test]
    fn test_server_error_messages_split_on_status() {
        let upstream = NetworkError::ServerError {
            status: 503,
            message: "unavailable".into(),
        };
        let client = NetworkError::ServerError {
            status: 404,
            message: "missing".into(),
        };
        assert_ne!(upstream.user_message(), client.user_message());
    }
}
