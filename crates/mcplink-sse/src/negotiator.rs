//! Endpoint discovery.
//!
//! The server announces where commands must be sent through the first `endpoint`
//! event on the stream. Its payload is normally a path/query fragment such as
//! `/messages?sessionId=abc`, resolved against the origin of the stream URL.
//!
//! Events arriving before the endpoint are discarded and only counted. They are the
//! hook for a protocol revision that wants the client to react to pre-endpoint
//! traffic; nothing in the current protocol does.

use std::time::Duration;

use mcplink_protocol::{Error, Result};
use serde_json::Value;
use tracing::{debug, info};
use url::{Position, Url};

use crate::event::EventKind;
use crate::reader::EventReader;

/// Query parameters recognized as the session identifier, in priority order
const SESSION_ID_PARAMS: [&str; 2] = ["sessionId", "session_id"];

/// Outcome of a successful discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    /// Absolute command endpoint
    pub endpoint: Url,
    /// Opaque session identifier derived from the endpoint
    pub session_id: String,
    /// Events dropped while waiting for the endpoint
    pub discarded_events: usize,
}

/// Consume events until the endpoint is announced.
///
/// # Errors
///
/// - [`Error::NegotiationTimeout`] if no endpoint event arrives within `timeout`
/// - [`Error::InvalidEndpoint`] if the endpoint payload is unusable
/// - [`Error::TransportClosed`] / [`Error::TransportTimeout`] from the reader
pub async fn discover_endpoint(
    reader: &mut EventReader,
    origin: &Url,
    timeout: Duration,
) -> Result<DiscoveredEndpoint> {
    match tokio::time::timeout(timeout, wait_for_endpoint(reader, origin)).await {
        Ok(result) => result,
        Err(_) => Err(Error::NegotiationTimeout { timeout }),
    }
}

async fn wait_for_endpoint(reader: &mut EventReader, origin: &Url) -> Result<DiscoveredEndpoint> {
    let mut discarded_events = 0;
    loop {
        let Some(event) = reader.next_event().await? else {
            return Err(Error::transport_closed(
                "event stream ended before an endpoint event",
            ));
        };

        if event.kind != EventKind::Endpoint {
            discarded_events += 1;
            debug!(kind = %event.kind, "Discarding event received before endpoint");
            continue;
        }

        let payload = event.payload_str();
        let endpoint = resolve_endpoint(origin, &payload)?;
        let session_id = session_id_for(&endpoint);
        info!(
            endpoint = %endpoint,
            session_id = %session_id,
            discarded_events,
            "Session endpoint discovered"
        );
        return Ok(DiscoveredEndpoint {
            endpoint,
            session_id,
            discarded_events,
        });
    }
}

/// Resolve an endpoint payload against the stream origin.
///
/// Accepts a path/query reference, an absolute `http(s)` URI, or a JSON object
/// `{"uri": "..."}`.
///
/// # Errors
///
/// Returns [`Error::InvalidEndpoint`] when the payload is empty, contains whitespace
/// or control characters, cannot be joined to `origin`, or resolves to a non-HTTP URI.
pub fn resolve_endpoint(origin: &Url, payload: &str) -> Result<Url> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_endpoint(payload, "empty payload"));
    }

    let reference = if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| Error::invalid_endpoint(payload, format!("malformed JSON: {e}")))?;
        match value.get("uri").and_then(Value::as_str) {
            Some(uri) => uri.trim().to_string(),
            None => {
                return Err(Error::invalid_endpoint(
                    payload,
                    "JSON payload has no string \"uri\" field",
                ));
            }
        }
    } else {
        trimmed.to_string()
    };

    if reference.is_empty() {
        return Err(Error::invalid_endpoint(payload, "empty endpoint reference"));
    }
    if reference.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::invalid_endpoint(
            payload,
            "whitespace or control characters in endpoint reference",
        ));
    }

    let endpoint = origin
        .join(&reference)
        .map_err(|e| Error::invalid_endpoint(payload, e.to_string()))?;

    match endpoint.scheme() {
        "http" | "https" => Ok(endpoint),
        other => Err(Error::invalid_endpoint(
            payload,
            format!("unsupported scheme {other:?}"),
        )),
    }
}

/// Session identifier carried by an endpoint.
///
/// The `sessionId` (or `session_id`) query parameter when present, otherwise the
/// endpoint's path and query.
pub fn session_id_for(endpoint: &Url) -> String {
    SESSION_ID_PARAMS
        .iter()
        .find_map(|name| {
            endpoint
                .query_pairs()
                .find(|(key, value)| key == *name && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_else(|| endpoint[Position::BeforePath..].to_string())
}
