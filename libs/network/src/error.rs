//! Network Error Types
//!
//! Errors surfaced to callers of the session API. Per-message protocol
//! failures are not errors here; they are delivered as session events.

use crate::session::ResponseState;
use codec::{FrameError, MessageCodecError};
use std::net::SocketAddr;
use thiserror::Error;
use types::MessageType;

/// Main network error type
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection establishment or socket failures
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation on a session that has already terminated
    #[error("Session {session_id} is closed")]
    SessionClosed { session_id: u64 },

    /// Message body encode/decode failure
    #[error("Codec error: {0}")]
    Codec(#[from] MessageCodecError),

    /// Stream framing failure
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Operation exceeded its deadline
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Message of the wrong type for the requested operation
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Response state machine refused a transition
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: Some(Box::new(source)),
        }
    }

    pub fn session_closed(session_id: u64) -> Self {
        Self::SessionClosed { session_id }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Whether the error means the session can no longer be used
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::SessionClosed { .. })
    }
}

/// Refused response state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The response already reached DONE or ERROR
    #[error("Response already completed (state: {state:?})")]
    AlreadyCompleted { state: ResponseState },

    /// Part sent out of sequence
    #[error("Out-of-order response part: expected {expected}, got {got}")]
    OutOfOrder { expected: i32, got: i32 },

    /// `current_count` outside `0..=total_count`
    #[error("Response part {current}/{total} is out of range")]
    CountOverflow { current: i32, total: i32 },

    /// Part's `total_count` differs from the rest of its run
    #[error("Response total changed mid-run: expected {expected}, got {got}")]
    TotalMismatch { expected: i32, got: i32 },

    /// Body type does not answer the request being served
    #[error("Unexpected response type {got} (expected {expected})")]
    UnexpectedType {
        expected: MessageType,
        got: MessageType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::timeout("connect", 5000);
        assert_eq!(err.to_string(), "Timeout error: connect exceeded 5000ms");

        let err: NetworkError = ResponseError::OutOfOrder {
            expected: 2,
            got: 3,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Response error: Out-of-order response part: expected 2, got 3"
        );
        assert!(NetworkError::session_closed(7).is_closed());
    }
}
