//! # mcplink client
//!
//! Client for tool servers that hand out their command endpoint over a server-pushed
//! event stream.
//!
//! ## Session lifecycle
//!
//! ```text
//! open(config)
//!   │  GET sse_url ──▶ event: endpoint / data: /messages?sessionId=…
//!   ▼
//! Discovered ──initialize──▶ Initializing ──result──▶ Initialized
//!                                  │                      │ notifications/initialized
//!                                  ▼                      ▼
//!                               Failed            invoke(tool, args, timeout)
//! ```
//!
//! - one read loop task per session routes every response by id, so concurrent
//!   `invoke` calls never wait on each other
//! - per-request failures (`RequestTimeout`, `ToolInvocation`) leave the session usable
//! - establishment failures abort `open` and are never retried internally
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mcplink_client::{Client, ClientConfig};
//! use serde_json::json;
//!
//! # async fn example() -> mcplink_protocol::Result<()> {
//! let config = ClientConfig::new("http://localhost:8080/servers/groupme/sse")
//!     .with_credential("X-GroupMe-Access-Token", "user-token");
//! let client = Client::open(config).await?;
//!
//! let mut arguments = mcplink_protocol::ToolArguments::new();
//! arguments.insert("group_id".into(), json!("12345"));
//! let messages = client
//!     .invoke("groupme_list_messages", arguments, Duration::from_secs(30))
//!     .await?;
//! println!("{messages}");
//!
//! client.close();
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod transport;

pub use client::{Client, PendingResponse, SessionState};
pub use config::{ClientConfig, CredentialHeader, parse_duration};
pub use transport::{HttpTransport, PostReply, Transport, TransportFuture};

pub use mcplink_protocol::{Error, ErrorKind, Result, ToolArguments};
