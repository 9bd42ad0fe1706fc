//! Server error types.

use crate::config::ConfigError;
use hyper::StatusCode;
use thiserror::Error;
use xmlrpc_protocol::FaultCode;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] xmlrpc_protocol::ProtocolError),

    #[error("core error: {0}")]
    Core(#[from] xmlrpc_core::CoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("method panicked: {0}")]
    Panicked(String),
}

impl ServerError {
    /// Returns the HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Protocol(e) if e.fault_code() != FaultCode::InternalError => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Core(e) if e.is_bad_request() => StatusCode::BAD_REQUEST,
            ServerError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ServerError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlrpc_protocol::ProtocolError;

    #[test]
    fn test_error_status() {
        assert_eq!(
            ServerError::from(ProtocolError::EmptyDocument).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(ProtocolError::Io(std::io::Error::other("x"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::BodyTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ServerError::Panicked("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let err = ServerError::BodyTooLarge { limit: 1024 };
        assert_eq!(err.to_string(), "request body exceeds 1024 bytes");
    }
}
