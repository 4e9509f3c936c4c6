//! Decoded stream events.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

/// Kind of a decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `event: endpoint` - carries the session's command endpoint
    Endpoint,
    /// `event: message`, or data lines with no event marker - carries a JSON-RPC message
    Data,
    /// Any other named event
    Unknown(String),
}

impl EventKind {
    /// Map an `event:` marker value to a kind
    pub fn from_marker(name: &str) -> Self {
        match name.trim() {
            "endpoint" => Self::Endpoint,
            "message" | "" => Self::Data,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint => f.write_str("endpoint"),
            Self::Data => f.write_str("message"),
            Self::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// One discrete named message decoded from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Event kind
    pub kind: EventKind,
    /// Data lines joined by `\n`
    pub payload: Bytes,
}

impl StreamEvent {
    /// Create an event
    pub fn new(kind: EventKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Payload as text (lossy for non UTF-8 input)
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
