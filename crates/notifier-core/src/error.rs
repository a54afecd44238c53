use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors produced by the game update notifier.
#[derive(Error, Debug)]
pub enum NotifierError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written (or renamed into place).
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or serialised.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The HTTP request itself failed (DNS, connect, TLS, body read).
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The upstream answered with a non-success status code.
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The upstream answered, but not with the shape we expected.
    #[error("Unexpected payload: {0}")]
    Payload(String),

    /// The upstream data set does not contain the requested entity.
    #[error("{kind} entity {id} not found in upstream data")]
    EntityNotFound { kind: String, id: String },

    /// A bounded operation did not finish in time.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// A guarded operation panicked; the panic was contained.
    #[error("{operation} panicked: {message}")]
    Panicked { operation: String, message: String },

    /// A sink accepted the request but refused the message.
    #[error("Delivery rejected by {sink}: {reason}")]
    DeliveryRejected { sink: String, reason: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NotifierError {
    /// Build a [`NotifierError::Http`] from any displayable transport error.
    pub fn http(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Http {
            url: url.into(),
            reason: err.to_string(),
        }
    }

    /// Build a [`NotifierError::EntityNotFound`].
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Convenience alias used throughout the notifier crates.
pub type Result<T> = std::result::Result<T, NotifierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = NotifierError::FileRead {
            path: PathBuf::from("/some/ledger.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/ledger.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_file_write() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = NotifierError::FileWrite {
            path: PathBuf::from("/ro/ledger.json"),
            source: io_err,
        };
        assert_eq!(err.to_string(), "Failed to write file /ro/ledger.json: denied");
    }

    #[test]
    fn test_error_display_http() {
        let err = NotifierError::http("https://example.test/a", "connection refused");
        assert_eq!(
            err.to_string(),
            "HTTP request to https://example.test/a failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_unexpected_status() {
        let err = NotifierError::UnexpectedStatus {
            url: "https://example.test".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "Unexpected HTTP status 503 from https://example.test");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = NotifierError::not_found("Steam", "730");
        assert_eq!(err.to_string(), "Steam entity 730 not found in upstream data");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = NotifierError::Timeout {
            operation: "refresh Steam/730".to_string(),
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "refresh Steam/730 timed out after 30s");
    }

    #[test]
    fn test_error_display_panicked() {
        let err = NotifierError::Panicked {
            operation: "deliver via discord".to_string(),
            message: "index out of bounds".to_string(),
        };
        assert_eq!(err.to_string(), "deliver via discord panicked: index out of bounds");
    }

    #[test]
    fn test_error_display_delivery_rejected() {
        let err = NotifierError::DeliveryRejected {
            sink: "telegram".to_string(),
            reason: "chat not found".to_string(),
        };
        assert_eq!(err.to_string(), "Delivery rejected by telegram: chat not found");
    }

    #[test]
    fn test_error_display_config() {
        let err = NotifierError::Config("no sinks configured".to_string());
        assert_eq!(err.to_string(), "Configuration error: no sinks configured");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: NotifierError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: NotifierError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
