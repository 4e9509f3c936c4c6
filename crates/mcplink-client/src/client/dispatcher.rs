//! Read loop: the single consumer of the event stream.
//!
//! Runs as its own task so that a caller waiting on a response never blocks delivery
//! of responses to other callers. When the stream ends or fails the session is closed
//! and every pending request resolves with `SessionClosed`.

use std::sync::Arc;

use mcplink_sse::{EventKind, EventReader};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::correlator::Correlator;
use super::session::Session;

#[derive(Debug)]
pub(super) struct ReadLoop {
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReadLoop {
    /// Start routing events from `reader` to `correlator`
    pub(super) fn spawn(
        reader: EventReader,
        correlator: Arc<Correlator>,
        session: Arc<Session>,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run(reader, correlator, session, Arc::clone(&shutdown)));
        Self {
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the loop; the stream is released when the task exits
    pub(super) fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Stop the loop without waiting for it to observe the signal
    pub(super) fn abort(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

async fn run(
    mut reader: EventReader,
    correlator: Arc<Correlator>,
    session: Arc<Session>,
    shutdown: Arc<Notify>,
) {
    debug!(session_id = session.id(), "Read loop started");
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!(session_id = session.id(), "Read loop shutting down");
                break;
            }
            next = reader.next_event() => match next {
                Ok(Some(event)) => match &event.kind {
                    EventKind::Data => correlator.route_message(&event.payload),
                    EventKind::Endpoint => warn!(
                        session_id = session.id(),
                        payload = %event.payload_str(),
                        "Ignoring repeated endpoint event"
                    ),
                    EventKind::Unknown(kind) => debug!(%kind, "Ignoring unknown event"),
                },
                Ok(None) => {
                    info!(session_id = session.id(), "Event stream ended");
                    break;
                }
                Err(e) => {
                    warn!(session_id = session.id(), error = %e, "Event stream failed");
                    break;
                }
            }
        }
    }

    // Dropping the reader releases the stream
    drop(reader);
    session.close();
    let abandoned = correlator.close();
    if abandoned > 0 {
        warn!(
            session_id = session.id(),
            abandoned, "Pending requests resolved with SessionClosed"
        );
    }
}
