//! Common test utilities for session integration tests
//!
//! `ScriptedTransport` is an in-memory transport: the event stream is an unbounded
//! channel the test (or the scripted server) writes SSE text into, and every POST is
//! recorded and answered by a responder closure.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;
use mcplink_client::{ClientConfig, PostReply, Transport, TransportFuture};
use mcplink_protocol::{Error, Result};
use mcplink_sse::ByteStream;
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

/// Stream URL every scripted session is opened against
pub const STREAM_URL: &str = "http://localhost:8080/sse";

/// How the scripted server answers one POST
#[derive(Debug, Clone)]
pub enum Reply {
    /// 202, nothing else
    Nothing,
    /// 202, then the message pushed as a `message` event on the stream
    OnStream(Value),
    /// Message returned inline in the POST response
    Inline(Value),
    /// POST fails
    Fail(String),
    /// POST never completes
    Hang,
}

type Responder = Box<dyn Fn(&Value) -> Reply + Send + Sync>;

pub struct ScriptedTransport {
    origin: Url,
    stream_tx: Mutex<Option<mpsc::UnboundedSender<Result<Bytes>>>>,
    stream_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes>>>>,
    posts: Mutex<Vec<Value>>,
    responder: Responder,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("origin", &self.origin.as_str())
            .field("posts", &self.posts.lock().len())
            .finish()
    }
}

impl ScriptedTransport {
    /// Transport whose server answers with `responder`; the stream starts empty
    pub fn new(responder: impl Fn(&Value) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded();
        Arc::new(Self {
            origin: Url::parse(STREAM_URL).unwrap(),
            stream_tx: Mutex::new(Some(tx)),
            stream_rx: Mutex::new(Some(rx)),
            posts: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Transport that already announced `/messages?sessionId=abc` and answers like [`tool_server`]
    pub fn ready() -> Arc<Self> {
        let transport = Self::new(tool_server);
        transport.announce("/messages?sessionId=abc");
        transport
    }

    /// Push raw SSE text onto the stream
    pub fn push(&self, text: &str) {
        if let Some(tx) = self.stream_tx.lock().as_ref() {
            let _ = tx.unbounded_send(Ok(Bytes::copy_from_slice(text.as_bytes())));
        }
    }

    /// Push an `endpoint` event
    pub fn announce(&self, payload: &str) {
        self.push(&format!("event: endpoint\ndata: {payload}\n\n"));
    }

    /// Push a JSON-RPC message as a `message` event
    pub fn push_message(&self, message: &Value) {
        self.push(&format!("event: message\ndata: {message}\n\n"));
    }

    /// End the stream (server hung up)
    pub fn hang_up(&self) {
        self.stream_tx.lock().take();
    }

    /// Whether the client dropped its end of the stream
    pub fn stream_released(&self) -> bool {
        self.stream_tx
            .lock()
            .as_ref()
            .is_none_or(|tx| tx.is_closed())
    }

    /// Every POSTed message so far, in send order
    pub fn posts(&self) -> Vec<Value> {
        self.posts.lock().clone()
    }

    /// POSTed messages with the given method
    pub fn posts_for(&self, method: &str) -> Vec<Value> {
        self.posts()
            .into_iter()
            .filter(|p| p["method"] == method)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn open_stream(&self) -> TransportFuture<'_, ByteStream> {
        Box::pin(async move {
            match self.stream_rx.lock().take() {
                Some(rx) => Ok(rx.boxed()),
                None => Err(Error::transport_closed("stream already opened")),
            }
        })
    }

    fn post<'a>(&'a self, _endpoint: &'a Url, body: Bytes) -> TransportFuture<'a, PostReply> {
        Box::pin(async move {
            let message: Value = serde_json::from_slice(&body)?;
            self.posts.lock().push(message.clone());
            match (self.responder)(&message) {
                Reply::Nothing => Ok(PostReply::Accepted),
                Reply::OnStream(reply) => {
                    self.push_message(&reply);
                    Ok(PostReply::Accepted)
                }
                Reply::Inline(reply) => Ok(PostReply::Message(Bytes::from(reply.to_string()))),
                Reply::Fail(reason) => Err(Error::send(reason)),
                Reply::Hang => futures::future::pending().await,
            }
        })
    }
}

/// Result of a successful `initialize`
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {}},
        "serverInfo": {"name": "scripted", "version": "0.0.1"}
    })
}

/// Scripted tool server answering on the stream:
///
/// - `initialize` succeeds
/// - `tools/list` lists `ping`, `slow`, `fail`
/// - tool `ping` returns `"pong"`, `echo` returns its arguments
/// - tool `slow` never answers
/// - tool `hang` stalls the POST itself
/// - tool `fail` returns error `-32000`
/// - unknown tools return `-32601`
pub fn tool_server(message: &Value) -> Reply {
    let Some(id) = message.get("id").cloned() else {
        return Reply::Nothing;
    };
    let result = |result: Value| Reply::OnStream(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    let error = |code: i64, text: &str| {
        Reply::OnStream(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": text}}))
    };

    match message["method"].as_str().unwrap_or_default() {
        "initialize" => result(initialize_result()),
        "tools/list" => result(json!({"tools": [
            {"name": "ping"}, {"name": "slow"}, {"name": "fail"}, {"name": "echo"}
        ]})),
        "tools/call" => match message["params"]["name"].as_str().unwrap_or_default() {
            "ping" => result(json!("pong")),
            "echo" => result(message["params"]["arguments"].clone()),
            "slow" => Reply::Nothing,
            "hang" => Reply::Hang,
            "fail" => error(-32000, "upstream rejected the request"),
            _ => error(-32601, "Unknown tool"),
        },
        _ => error(-32601, "Method not found"),
    }
}

/// Client configuration with timeouts short enough for tests
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new(STREAM_URL);
    config.negotiation_timeout = Duration::from_secs(2);
    config.handshake_timeout = Duration::from_secs(2);
    config.request_timeout = Duration::from_secs(2);
    config.read_timeout = Duration::from_secs(2);
    config
}

/// Route test logs through the test harness when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
