//! Session record and lifecycle state machine.
//!
//! ```text
//! Discovered ──▶ Initializing ──▶ Initialized
//!                     │
//!                     └────────▶ Failed
//!
//! any state ──▶ Closed
//! ```
//!
//! `Discovered` is the handshake's not-started state: the endpoint is known but no
//! application request may be sent yet.

use std::fmt;

use mcplink_protocol::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Endpoint discovered, handshake not started
    Discovered,
    /// `initialize` sent, waiting for its response
    Initializing,
    /// Handshake complete; application requests are allowed
    Initialized,
    /// Handshake failed; the session cannot be used
    Failed,
    /// Stream released, by the caller or because it ended
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{Closed, Discovered, Failed, Initialized, Initializing};
        matches!(
            (self, next),
            (Discovered, Initializing) | (Initializing, Initialized | Failed)
        ) || (next == Closed && self != Closed)
    }

    /// Whether application requests are allowed
    pub fn is_ready(self) -> bool {
        self == Self::Initialized
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discovered => "discovered",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One negotiated conversation with a tool server
#[derive(Debug)]
pub(crate) struct Session {
    id: String,
    endpoint: Url,
    state: RwLock<SessionState>,
    server_info: RwLock<Option<Value>>,
}

impl Session {
    pub(crate) fn new(id: String, endpoint: Url) -> Self {
        Self {
            id,
            endpoint,
            state: RwLock::new(SessionState::Discovered),
            server_info: RwLock::new(None),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub(crate) fn server_info(&self) -> Option<Value> {
        self.server_info.read().clone()
    }

    pub(crate) fn set_server_info(&self, info: Value) {
        *self.server_info.write() = Some(info);
    }

    /// Apply a guarded transition, returning the previous state.
    ///
    /// Fails with `SessionClosed` once closed, and `SessionNotReady` for any other
    /// illegal move.
    pub(crate) fn transition(&self, next: SessionState) -> Result<SessionState> {
        let mut state = self.state.write();
        let current = *state;
        if current == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        if !current.can_transition_to(next) {
            return Err(Error::session_not_ready(current));
        }
        *state = next;
        Ok(current)
    }

    /// Gate for application requests
    pub(crate) fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            SessionState::Initialized => Ok(()),
            SessionState::Closed => Err(Error::SessionClosed),
            other => Err(Error::session_not_ready(other)),
        }
    }

    /// Mark closed; `false` if it already was
    pub(crate) fn close(&self) -> bool {
        self.transition(SessionState::Closed).is_ok()
    }
}
