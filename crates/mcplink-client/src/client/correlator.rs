//! Request/response correlation.
//!
//! Every outgoing request gets the next id of the session and a pending entry holding
//! a oneshot slot. Responses are matched purely by id, whichever channel they arrive
//! on (event stream or inline POST reply) and in whatever order.
//!
//! ```text
//! send()                         read loop / inline reply
//!   1. lock, id = next_id++        route_message(bytes)
//!   2. insert pending[id]            lock, pending.remove(id)
//!   3. unlock, POST request          slot.send(response)
//!   4. return PendingResponse    PendingResponse::await_response()
//! ```
//!
//! The caller's timeout starts at step 1 and bounds the POST as well as the wait
//! for the response. The table lock is never held across an await.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use mcplink_protocol::{
    Error, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Result,
};
use mcplink_sse::{EventKind, StreamEvent};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use url::Url;

use crate::transport::{PostReply, Transport};

struct PendingRequest {
    method: String,
    sent_at: Instant,
    slot: oneshot::Sender<JsonRpcResponse>,
}

struct PendingTable {
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
    closed: bool,
}

impl PendingTable {
    fn remove(&mut self, id: u64) -> Option<PendingRequest> {
        self.pending.remove(&id)
    }
}

/// Matches responses to in-flight requests of one session
pub(crate) struct Correlator {
    table: Arc<Mutex<PendingTable>>,
    unmatched: AtomicU64,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        f.debug_struct("Correlator")
            .field("next_id", &table.next_id)
            .field("in_flight", &table.pending.len())
            .field("closed", &table.closed)
            .field("unmatched", &self.unmatched.load(Ordering::Relaxed))
            .finish()
    }
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(PendingTable {
                next_id: 1,
                pending: HashMap::new(),
                closed: false,
            })),
            unmatched: AtomicU64::new(0),
        }
    }

    /// Register and transmit a request.
    ///
    /// The pending entry exists before the POST goes out, so a reply that races the
    /// POST (or comes back inline) still finds it. If transmission fails or does not
    /// finish within `timeout` the entry is removed again. The returned handle keeps
    /// the same deadline for [`PendingResponse::await_deadline`].
    pub(crate) async fn send<T: Transport + ?Sized>(
        &self,
        transport: &T,
        endpoint: &Url,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        let deadline = tokio::time::Instant::now() + timeout;
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut table = self.table.lock();
            if table.closed {
                return Err(Error::SessionClosed);
            }
            let id = table.next_id;
            table.next_id += 1;
            table.pending.insert(
                id,
                PendingRequest {
                    method: method.to_string(),
                    sent_at: Instant::now(),
                    slot: tx,
                },
            );
            id
        };
        let pending = PendingResponse {
            id,
            method: method.to_string(),
            timeout,
            deadline,
            rx,
            table: Arc::clone(&self.table),
        };

        let body = serde_json::to_vec(&JsonRpcRequest::new(id, method, params))?;
        debug!(id, method, "Sending request");
        // `pending` is dropped on error, which removes the entry
        let post = transport.post(endpoint, Bytes::from(body));
        let reply = match tokio::time::timeout_at(deadline, post).await {
            Ok(reply) => reply?,
            Err(_) => {
                warn!(id, method, ?timeout, "Request POST did not complete");
                return Err(pending.timed_out());
            }
        };
        self.route_reply(reply);
        Ok(pending)
    }

    /// Transmit a notification; no reply is expected or awaited.
    ///
    /// # Errors
    ///
    /// [`Error::Send`] if the POST fails or does not complete within `timeout`.
    pub(crate) async fn notify<T: Transport + ?Sized>(
        &self,
        transport: &T,
        endpoint: &Url,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<()> {
        if self.table.lock().closed {
            return Err(Error::SessionClosed);
        }
        let body = serde_json::to_vec(&JsonRpcNotification::new(method, params))?;
        debug!(method, "Sending notification");
        let reply = tokio::time::timeout(timeout, transport.post(endpoint, Bytes::from(body)))
            .await
            .map_err(|_| Error::send(format!("{method} not delivered within {timeout:?}")))??;
        self.route_reply(reply);
        Ok(())
    }

    fn route_reply(&self, reply: PostReply) {
        match reply {
            PostReply::Accepted => {}
            PostReply::Message(bytes) => self.route_message(&bytes),
            PostReply::EventStream(events) => {
                for event in events {
                    self.route_event(&event);
                }
            }
        }
    }

    /// Route a `message` event; other kinds are ignored
    pub(crate) fn route_event(&self, event: &StreamEvent) {
        match &event.kind {
            EventKind::Data => self.route_message(&event.payload),
            other => trace!(kind = %other, "Ignoring non-message event"),
        }
    }

    /// Parse one raw message and deliver it if it is a response
    pub(crate) fn route_message(&self, bytes: &[u8]) {
        match JsonRpcMessage::from_slice(bytes) {
            Ok(JsonRpcMessage::Response(response)) => self.deliver(response),
            Ok(message) => {
                debug!(
                    method = message.method().unwrap_or_default(),
                    "Dropping server-initiated message"
                );
            }
            Err(e) => warn!(error = %e, "Dropping malformed message"),
        }
    }

    /// Resolve the pending request matching `response.id`.
    ///
    /// Responses nobody is waiting for are counted and dropped.
    pub(crate) fn deliver(&self, response: JsonRpcResponse) {
        let id = response.id.as_ref().and_then(|id| id.as_u64());
        let entry = id.and_then(|id| self.table.lock().remove(id).map(|entry| (id, entry)));

        match entry {
            Some((id, entry)) => {
                debug!(
                    id,
                    method = %entry.method,
                    elapsed_ms = entry.sent_at.elapsed().as_millis() as u64,
                    "Response matched"
                );
                // The waiter may have given up between removal and send
                let _ = entry.slot.send(response);
            }
            None => {
                self.unmatched.fetch_add(1, Ordering::Relaxed);
                warn!(
                    id = ?response.id,
                    "Dropping response with no pending request"
                );
            }
        }
    }

    /// Refuse new requests and resolve every outstanding one with `SessionClosed`.
    ///
    /// Returns how many requests were outstanding.
    pub(crate) fn close(&self) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.pending.drain().map(|(_, entry)| entry).collect()
        };
        // Dropping the senders wakes the waiters
        drained.len()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.table.lock().pending.len()
    }

    pub(crate) fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }
}

/// Handle to one in-flight request.
///
/// Dropping the handle abandons the request: its pending entry is removed and a late
/// response is treated as unmatched.
pub struct PendingResponse {
    id: u64,
    method: String,
    timeout: Duration,
    deadline: tokio::time::Instant,
    rx: oneshot::Receiver<JsonRpcResponse>,
    table: Arc<Mutex<PendingTable>>,
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse")
            .field("id", &self.id)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl PendingResponse {
    /// Correlation id assigned to the request
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Method of the request
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wait for the matching response.
    ///
    /// Only the calling task is suspended; the read loop keeps delivering responses
    /// to other waiters.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if nothing arrives within `timeout`; the entry is
    ///   removed so a late response is dropped as unmatched
    /// - [`Error::SessionClosed`] if the session closes first
    pub async fn await_response(mut self, timeout: Duration) -> Result<JsonRpcResponse> {
        self.timeout = timeout;
        self.deadline = tokio::time::Instant::now() + timeout;
        self.await_deadline().await
    }

    /// Wait for the matching response until the deadline set when the request was
    /// sent, so the POST and the wait share one timeout.
    ///
    /// # Errors
    ///
    /// As [`await_response`](Self::await_response).
    pub(crate) async fn await_deadline(mut self) -> Result<JsonRpcResponse> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => {
                warn!(id = self.id, method = %self.method, timeout = ?self.timeout, "Request timed out");
                Err(self.timed_out())
            }
        }
    }

    fn timed_out(&self) -> Error {
        Error::RequestTimeout {
            id: self.id,
            method: self.method.clone(),
            timeout: self.timeout,
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if self.table.lock().remove(self.id).is_some() {
            trace!(id = self.id, "Abandoned pending request removed");
        }
    }
}
