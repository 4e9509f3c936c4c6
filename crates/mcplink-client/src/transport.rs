//! Transport abstraction and its HTTP implementation.
//!
//! A transport provides the two channels of a session: the long-lived event stream
//! (server to client) and per-message POSTs to the negotiated endpoint (client to
//! server). Replies may come back on either channel; the transport only classifies
//! what a POST returned and leaves correlation to the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt;
use mcplink_protocol::{Error, Result};
use mcplink_sse::{ByteStream, StreamEvent, decode_all};
use reqwest::{Client as HttpClient, StatusCode, header};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;

/// Boxed future returned by [`Transport`] methods
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the server returned for a POSTed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostReply {
    /// Accepted without a body; any response arrives on the event stream
    Accepted,
    /// A single JSON message returned inline
    Message(Bytes),
    /// An event-stream body, already decoded
    EventStream(Vec<StreamEvent>),
}

/// Byte-level session transport
pub trait Transport: Send + Sync + fmt::Debug {
    /// Base URL the endpoint reference is resolved against
    fn origin(&self) -> &Url;

    /// Open the server-pushed event stream.
    ///
    /// # Errors
    ///
    /// [`Error::TransportClosed`] if the stream cannot be established.
    fn open_stream(&self) -> TransportFuture<'_, ByteStream>;

    /// Deliver one serialized message to `endpoint` as a single unit.
    ///
    /// # Errors
    ///
    /// [`Error::Send`] if the message could not be delivered.
    fn post<'a>(&'a self, endpoint: &'a Url, body: Bytes) -> TransportFuture<'a, PostReply>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn origin(&self) -> &Url {
        (**self).origin()
    }

    fn open_stream(&self) -> TransportFuture<'_, ByteStream> {
        (**self).open_stream()
    }

    fn post<'a>(&'a self, endpoint: &'a Url, body: Bytes) -> TransportFuture<'a, PostReply> {
        (**self).post(endpoint, body)
    }
}

/// [`Transport`] over HTTP: GET for the event stream, POST for messages
#[derive(Clone)]
pub struct HttpTransport {
    http: HttpClient,
    origin: Url,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("origin", &self.origin.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport for `config.sse_url`.
    ///
    /// Bearer token, credential header and custom headers are attached to every request.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an invalid URL or header.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let origin = config.stream_url()?;

        // Explicit rustls: cargo features are additive and another crate may pull in native-tls
        let mut builder = HttpClient::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout)
            .default_headers(build_headers(config)?);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let http = builder
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, origin })
    }
}

fn build_headers(config: &ClientConfig) -> Result<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();

    if let Some(token) = &config.auth_token {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::configuration("auth token is not a valid header value"))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    if let Some(credential) = &config.credential {
        let name = header::HeaderName::from_bytes(credential.header.as_bytes()).map_err(|_| {
            Error::configuration(format!("invalid credential header {:?}", credential.header))
        })?;
        let mut value = header::HeaderValue::from_str(&credential.secret)
            .map_err(|_| Error::configuration("credential secret is not a valid header value"))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }

    for (key, value) in &config.headers {
        let name = header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| Error::configuration(format!("invalid header name {key:?}")))?;
        let value = header::HeaderValue::from_str(value)
            .map_err(|_| Error::configuration(format!("invalid value for header {key:?}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}

impl Transport for HttpTransport {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn open_stream(&self) -> TransportFuture<'_, ByteStream> {
        Box::pin(async move {
            debug!(url = %self.origin, "Opening event stream");
            let response = self
                .http
                .get(self.origin.clone())
                .header(header::ACCEPT, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .send()
                .await
                .map_err(|e| Error::transport_closed(format!("failed to open event stream: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::transport_closed(format!(
                    "event stream request failed: {status}"
                )));
            }
            let content_type = content_type(&response);
            if !content_type.contains("text/event-stream") {
                warn!(%content_type, "Event stream served with unexpected content type");
            }

            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| Error::transport_closed(e.to_string())))
                .boxed();
            Ok(stream)
        })
    }

    fn post<'a>(&'a self, endpoint: &'a Url, body: Bytes) -> TransportFuture<'a, PostReply> {
        Box::pin(async move {
            let response = self
                .http
                .post(endpoint.clone())
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json, text/event-stream")
                .body(body)
                .send()
                .await
                .map_err(|e| Error::send(format!("POST {endpoint} failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                let detail = detail.trim();
                return Err(Error::send(if detail.is_empty() {
                    format!("POST {endpoint} returned {status}")
                } else {
                    format!("POST {endpoint} returned {status}: {detail}")
                }));
            }
            if status == StatusCode::ACCEPTED {
                debug!("POST accepted, reply expected on the event stream");
                return Ok(PostReply::Accepted);
            }

            let content_type = content_type(&response);
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::send(format!("failed to read POST reply: {e}")))?;

            if body.iter().all(u8::is_ascii_whitespace) {
                Ok(PostReply::Accepted)
            } else if content_type.contains("application/json") {
                debug!(bytes = body.len(), "POST returned an inline JSON reply");
                Ok(PostReply::Message(body))
            } else if content_type.contains("text/event-stream") {
                let events = decode_all(&body)?;
                debug!(events = events.len(), "POST returned an event-stream reply");
                Ok(PostReply::EventStream(events))
            } else {
                debug!(%content_type, "Ignoring non-JSON POST reply body");
                Ok(PostReply::Accepted)
            }
        })
    }
}
