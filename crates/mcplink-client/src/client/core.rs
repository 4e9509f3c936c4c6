//! Client facade.
//!
//! `Client<T>` is cheap to clone: all clones share one session, one correlator and one
//! read loop through an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use mcplink_protocol::types::{METHOD_TOOLS_CALL, METHOD_TOOLS_LIST};
use mcplink_protocol::{CallToolParams, Error, Result, ToolArguments};
use mcplink_sse::{EventReader, discover_endpoint};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use super::correlator::{Correlator, PendingResponse};
use super::dispatcher::ReadLoop;
use super::handshake;
use super::session::{Session, SessionState};
use crate::config::ClientConfig;
use crate::transport::{HttpTransport, Transport};

struct ClientInner<T: Transport + 'static> {
    transport: T,
    config: ClientConfig,
    session: Arc<Session>,
    correlator: Arc<Correlator>,
    read_loop: ReadLoop,
}

impl<T: Transport + 'static> Drop for ClientInner<T> {
    fn drop(&mut self) {
        // Last clone gone: stop the read loop so the stream is released
        self.read_loop.shutdown();
    }
}

/// Client for one stream-negotiated tool server session
///
/// ```rust,no_run
/// use std::time::Duration;
/// use mcplink_client::{Client, ClientConfig};
///
/// # async fn example() -> mcplink_protocol::Result<()> {
/// let client = Client::open(ClientConfig::new("http://localhost:8080/sse")).await?;
/// let pong = client
///     .invoke("ping", Default::default(), Duration::from_secs(5))
///     .await?;
/// println!("{pong}");
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport + 'static = HttpTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport + 'static> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.inner.session.id())
            .field("endpoint", &self.inner.session.endpoint().as_str())
            .field("state", &self.inner.session.state())
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl Client<HttpTransport> {
    /// Open a ready session over HTTP: discover the endpoint, then run the handshake.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an unusable configuration, otherwise the first
    /// establishment error (see [`Client::open_with`]).
    pub async fn open(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::open_with(transport, config).await
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Open a ready session over `transport`.
    ///
    /// On failure everything opened so far (stream, read loop) is released.
    ///
    /// # Errors
    ///
    /// `TransportClosed`, `TransportTimeout`, `InvalidEndpoint`, `NegotiationTimeout`
    /// from discovery, or `HandshakeFailed`.
    pub async fn open_with(transport: T, config: ClientConfig) -> Result<Self> {
        let client = Self::connect(transport, config).await?;
        if let Err(e) = client.initialize().await {
            client.release();
            return Err(e);
        }
        Ok(client)
    }

    /// Open the stream and discover the endpoint, leaving the session `Discovered`.
    ///
    /// The handshake is left to [`initialize`](Self::initialize).
    ///
    /// # Errors
    ///
    /// `TransportClosed`, `TransportTimeout`, `InvalidEndpoint` or `NegotiationTimeout`.
    pub async fn connect(transport: T, config: ClientConfig) -> Result<Self> {
        let stream = transport.open_stream().await.inspect_err(|e| {
            error!(origin = %transport.origin(), error = %e, "Failed to open event stream");
        })?;
        let mut reader = EventReader::new(stream).with_read_timeout(Some(config.read_timeout));

        // On error the reader, and with it the stream, is dropped here
        let discovered =
            discover_endpoint(&mut reader, transport.origin(), config.negotiation_timeout)
                .await
                .inspect_err(|e| {
                    error!(origin = %transport.origin(), error = %e, "Endpoint discovery failed");
                })?;

        reader.set_read_timeout(config.idle_timeout);
        let session = Arc::new(Session::new(discovered.session_id, discovered.endpoint));
        let correlator = Arc::new(Correlator::new());
        let read_loop = ReadLoop::spawn(reader, Arc::clone(&correlator), Arc::clone(&session));

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                session,
                correlator,
                read_loop,
            }),
        })
    }

    /// Run the capability handshake on a `Discovered` session.
    ///
    /// Returns the server's opaque `initialize` result.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeFailed`] if the exchange fails; `SessionNotReady` if the
    /// handshake already ran.
    pub async fn initialize(&self) -> Result<Value> {
        let inner = &self.inner;
        let result =
            handshake::perform(&inner.transport, &inner.session, &inner.correlator, &inner.config)
                .await?;
        inner.session.set_server_info(result.clone());
        Ok(result)
    }

    /// Invoke a named tool and return its result verbatim.
    ///
    /// # Errors
    ///
    /// - `SessionNotReady` before the handshake completed (nothing is sent)
    /// - `ToolInvocation` if the server answered with an error object
    /// - `RequestTimeout` if the POST and the response together take longer than `timeout`;
    ///   the session stays usable
    /// - `SessionClosed`, `Send`
    pub async fn invoke(
        &self,
        tool: &str,
        arguments: ToolArguments,
        timeout: Duration,
    ) -> Result<Value> {
        self.inner.session.ensure_ready()?;
        let params = serde_json::to_value(CallToolParams::new(tool, arguments))?;
        self.request(METHOD_TOOLS_CALL, Some(params), timeout).await
    }

    /// List the tools the server exposes (opaque `tools/list` result).
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn list_tools(&self, timeout: Duration) -> Result<Value> {
        self.inner.session.ensure_ready()?;
        self.request(METHOD_TOOLS_LIST, None, timeout).await
    }

    /// Send an arbitrary request without waiting for its response.
    ///
    /// The POST is bounded by the configured request timeout.
    ///
    /// # Errors
    ///
    /// `SessionNotReady`, `SessionClosed`, `Send`, or `RequestTimeout` if the POST
    /// does not complete in time.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<PendingResponse> {
        self.inner.session.ensure_ready()?;
        let inner = &self.inner;
        inner
            .correlator
            .send(
                &inner.transport,
                inner.session.endpoint(),
                method,
                params,
                inner.config.request_timeout,
            )
            .await
    }

    /// Send a notification.
    ///
    /// # Errors
    ///
    /// `SessionNotReady`, `SessionClosed` or `Send`.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.inner.session.ensure_ready()?;
        let inner = &self.inner;
        inner
            .correlator
            .notify(
                &inner.transport,
                inner.session.endpoint(),
                method,
                params,
                inner.config.request_timeout,
            )
            .await
    }

    async fn request(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        let inner = &self.inner;
        // One deadline for the POST and the response
        let pending = inner
            .correlator
            .send(&inner.transport, inner.session.endpoint(), method, params, timeout)
            .await?;
        let id = pending.id();
        let result = pending.await_deadline().await?.into_result();
        if let Err(Error::ToolInvocation { code, message, .. }) = &result {
            debug!(id, method, code, %message, "Server returned an error");
        }
        result
    }

    /// Release the stream and mark the session `Closed`.
    ///
    /// Outstanding requests resolve with `SessionClosed`. Closing twice is a no-op.
    pub fn close(&self) {
        if self.inner.session.close() {
            let abandoned = self.inner.correlator.close();
            self.inner.read_loop.shutdown();
            info!(
                session_id = self.inner.session.id(),
                abandoned, "Session closed"
            );
        }
    }

    fn release(&self) {
        self.inner.session.close();
        self.inner.correlator.close();
        self.inner.read_loop.abort();
    }

    /// Opaque session identifier
    pub fn session_id(&self) -> &str {
        self.inner.session.id()
    }

    /// Absolute command endpoint
    pub fn endpoint(&self) -> &Url {
        self.inner.session.endpoint()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Whether [`invoke`](Self::invoke) is currently allowed
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The server's `initialize` result, once the handshake completed
    pub fn server_info(&self) -> Option<Value> {
        self.inner.session.server_info()
    }

    /// Number of requests waiting for a response
    pub fn in_flight(&self) -> usize {
        self.inner.correlator.in_flight()
    }

    /// Responses dropped because no request was waiting for them
    pub fn unmatched_responses(&self) -> u64 {
        self.inner.correlator.unmatched()
    }

    /// Configuration the client was opened with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}
