//! HTTP error types

use std::time::Duration;

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = HttpError> = std::result::Result<T, E>;

/// HTTP errors that can occur while building or sending requests
#[derive(Debug, Error)]
pub enum HttpError {
    /// Invalid input rejected before any network I/O
    #[error("Invalid argument: {0}")]
    Argument(String),
    /// The per-request timeout elapsed
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The client was closed
    #[error("Client is closed")]
    Closed,
    /// Error raised by the underlying engine, passed through untouched
    #[error(transparent)]
    Engine(#[from] reqwest::Error),
    /// I/O error while producing a request body
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP error with status code
    #[error("HTTP error ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Proxy error
    #[error("Proxy error: {0}")]
    Proxy(String),
    /// Client build error
    #[error("Client build error: {0}")]
    Build(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl HttpError {
    /// Whether this error was caused by the per-request timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            HttpError::Timeout(_) => true,
            HttpError::Engine(err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Serialization(err.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for HttpError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        HttpError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        HttpError::Argument(format!("Invalid URL: {}", err))
    }
}

impl From<config::ConfigError> for HttpError {
    fn from(err: config::ConfigError) -> Self {
        HttpError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_status_display() {
        let error = HttpError::Status {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(format!("{}", error), "HTTP error (404): Not Found");
    }

    #[test]
    fn test_http_error_argument_display() {
        let error = HttpError::Argument("Unknown request body".to_string());
        assert_eq!(format!("{}", error), "Invalid argument: Unknown request body");
    }

    #[test]
    fn test_http_error_timeout_display() {
        let error = HttpError::Timeout(Duration::from_millis(250));
        assert_eq!(format!("{}", error), "Request timed out after 250ms");
        assert!(error.is_timeout());
    }

    #[test]
    fn test_http_error_closed_display() {
        assert_eq!(format!("{}", HttpError::Closed), "Client is closed");
        assert!(!HttpError::Closed.is_timeout());
    }

    #[test]
    fn test_http_error_proxy_display() {
        let error = HttpError::Proxy("proxy unreachable".to_string());
        assert_eq!(format!("{}", error), "Proxy error: proxy unreachable");
    }

    #[test]
    fn test_http_error_build_display() {
        let error = HttpError::Build("invalid config".to_string());
        assert_eq!(format!("{}", error), "Client build error: invalid config");
    }

    #[test]
    fn test_http_error_other_display() {
        let error = HttpError::Other("unknown error".to_string());
        assert_eq!(format!("{}", error), "unknown error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.bin");
        let http_error: HttpError = io_error.into();
        assert!(matches!(http_error, HttpError::Io(_)));
        assert_eq!(format!("{}", http_error), "I/O error: missing.bin");
    }

    #[test]
    fn test_from_url_parse_error() {
        let parse_error = url::Url::parse("not a url").expect_err("Invalid URL should fail");
        let http_error: HttpError = parse_error.into();
        match http_error {
            HttpError::Argument(msg) => assert!(msg.starts_with("Invalid URL")),
            _ => panic!("Expected HttpError::Argument"),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let result: std::result::Result<String, _> = serde_json::from_str("not valid json");
        let json_error = result.expect_err("Invalid JSON should produce an error");
        let http_error: HttpError = json_error.into();

        match http_error {
            HttpError::Serialization(msg) => {
                assert!(
                    msg.contains("expected"),
                    "Error message should describe JSON error"
                );
            }
            _ => panic!("Expected HttpError::Serialization"),
        }
    }
}
