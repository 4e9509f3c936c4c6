//! Unified error type for every mcplink crate.
//!
//! Session establishment failures (`TransportClosed`, `TransportTimeout`,
//! `InvalidEndpoint`, `NegotiationTimeout`, `HandshakeFailed`) abort `open` and are
//! never retried internally. Per-request failures (`RequestTimeout`,
//! `ToolInvocation`, `Send`) are scoped to one call and leave the session usable.
//!
//! ## Example
//!
//! ```rust
//! use mcplink_protocol::{Error, ErrorKind};
//!
//! let err = Error::tool_invocation(-32601, "Method not found", None);
//! assert_eq!(err.kind(), ErrorKind::ToolInvocation);
//! assert!(!err.is_session_fatal());
//! ```

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for mcplink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the stream reader, the negotiator, the correlator and the client.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The event stream ended (or could not be opened) before it was useful.
    #[error("Transport closed: {reason}")]
    TransportClosed {
        /// What closed the stream
        reason: String,
    },

    /// A read on the event stream stalled past the configured read timeout.
    #[error("Transport read stalled for {timeout:?}")]
    TransportTimeout {
        /// The read timeout that was exceeded
        timeout: Duration,
    },

    /// The bootstrap event carried something that is not a usable endpoint reference.
    #[error("Invalid endpoint {payload:?}: {reason}")]
    InvalidEndpoint {
        /// Raw event payload
        payload: String,
        /// Why it was rejected
        reason: String,
    },

    /// No endpoint event arrived within the negotiation window.
    #[error("No endpoint event received within {timeout:?}")]
    NegotiationTimeout {
        /// The negotiation timeout that was exceeded
        timeout: Duration,
    },

    /// The initialize/initialized exchange did not complete.
    #[error("Handshake failed: {reason}")]
    HandshakeFailed {
        /// Underlying cause, already rendered for display
        reason: String,
    },

    /// An application request was attempted before the handshake completed.
    #[error("Session not ready (state: {state})")]
    SessionNotReady {
        /// Session state at the time of the call
        state: String,
    },

    /// No response with the request's id arrived in time.
    #[error("Request {id} ({method}) timed out after {timeout:?}")]
    RequestTimeout {
        /// Correlation id of the abandoned request
        id: u64,
        /// Method of the abandoned request
        method: String,
        /// The request timeout that was exceeded
        timeout: Duration,
    },

    /// The session was closed while the operation was outstanding or before it started.
    #[error("Session closed")]
    SessionClosed,

    /// The server answered with a JSON-RPC error object.
    #[error("Tool invocation failed [{code}]: {message}")]
    ToolInvocation {
        /// JSON-RPC error code
        code: i32,
        /// JSON-RPC error message
        message: String,
        /// Optional structured error data from the server
        data: Option<Value>,
    },

    /// A request or notification could not be delivered to the endpoint.
    #[error("Send failed: {0}")]
    Send(String),

    /// A message violated the JSON-RPC envelope or could not be (de)serialized.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The client was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Error classification for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::TransportClosed`]
    TransportClosed,
    /// See [`Error::TransportTimeout`]
    TransportTimeout,
    /// See [`Error::InvalidEndpoint`]
    InvalidEndpoint,
    /// See [`Error::NegotiationTimeout`]
    NegotiationTimeout,
    /// See [`Error::HandshakeFailed`]
    HandshakeFailed,
    /// See [`Error::SessionNotReady`]
    SessionNotReady,
    /// See [`Error::RequestTimeout`]
    RequestTimeout,
    /// See [`Error::SessionClosed`]
    SessionClosed,
    /// See [`Error::ToolInvocation`]
    ToolInvocation,
    /// See [`Error::Send`]
    Send,
    /// See [`Error::Protocol`]
    Protocol,
    /// See [`Error::Configuration`]
    Configuration,
}

impl Error {
    /// Create a [`Error::TransportClosed`] error
    pub fn transport_closed(reason: impl Into<String>) -> Self {
        Self::TransportClosed {
            reason: reason.into(),
        }
    }

    /// Create a [`Error::InvalidEndpoint`] error
    pub fn invalid_endpoint(payload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            payload: payload.into(),
            reason: reason.into(),
        }
    }

    /// Create a [`Error::HandshakeFailed`] error
    pub fn handshake_failed(reason: impl fmt::Display) -> Self {
        Self::HandshakeFailed {
            reason: reason.to_string(),
        }
    }

    /// Create a [`Error::SessionNotReady`] error
    pub fn session_not_ready(state: impl fmt::Display) -> Self {
        Self::SessionNotReady {
            state: state.to_string(),
        }
    }

    /// Create a [`Error::ToolInvocation`] error
    pub fn tool_invocation(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::ToolInvocation {
            code,
            message: message.into(),
            data,
        }
    }

    /// Create a [`Error::Send`] error
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }

    /// Create a [`Error::Protocol`] error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a [`Error::Configuration`] error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportClosed { .. } => ErrorKind::TransportClosed,
            Self::TransportTimeout { .. } => ErrorKind::TransportTimeout,
            Self::InvalidEndpoint { .. } => ErrorKind::InvalidEndpoint,
            Self::NegotiationTimeout { .. } => ErrorKind::NegotiationTimeout,
            Self::HandshakeFailed { .. } => ErrorKind::HandshakeFailed,
            Self::SessionNotReady { .. } => ErrorKind::SessionNotReady,
            Self::RequestTimeout { .. } => ErrorKind::RequestTimeout,
            Self::SessionClosed => ErrorKind::SessionClosed,
            Self::ToolInvocation { .. } => ErrorKind::ToolInvocation,
            Self::Send(_) => ErrorKind::Send,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the session that produced this error can no longer serve requests.
    ///
    /// Per-request failures return `false`: the caller may issue further calls.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransportClosed
                | ErrorKind::TransportTimeout
                | ErrorKind::InvalidEndpoint
                | ErrorKind::NegotiationTimeout
                | ErrorKind::HandshakeFailed
                | ErrorKind::SessionClosed
        )
    }

    /// Whether this is any of the timeout variants
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransportTimeout | ErrorKind::NegotiationTimeout | ErrorKind::RequestTimeout
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransportClosed => "transport_closed",
            Self::TransportTimeout => "transport_timeout",
            Self::InvalidEndpoint => "invalid_endpoint",
            Self::NegotiationTimeout => "negotiation_timeout",
            Self::HandshakeFailed => "handshake_failed",
            Self::SessionNotReady => "session_not_ready",
            Self::RequestTimeout => "request_timeout",
            Self::SessionClosed => "session_closed",
            Self::ToolInvocation => "tool_invocation",
            Self::Send => "send",
            Self::Protocol => "protocol",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}
