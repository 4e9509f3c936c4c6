//! # mcplink SSE
//!
//! Client side of the server-pushed event stream:
//!
//! - [`decoder`]: incremental `event:`/`data:` line framing
//! - [`reader`]: lazy, in-order [`EventReader`] with a per-read stall timeout
//! - [`negotiator`]: waits for the `endpoint` event and resolves the command endpoint
//!
//! ## Example
//!
//! ```rust
//! use mcplink_sse::{EventKind, decode_all};
//!
//! # fn main() -> mcplink_protocol::Result<()> {
//! let events = decode_all(b"event: endpoint\ndata: /messages?sessionId=abc\n\n")?;
//! assert_eq!(events[0].kind, EventKind::Endpoint);
//! assert_eq!(events[0].payload_str(), "/messages?sessionId=abc");
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

pub mod decoder;
pub mod event;
pub mod negotiator;
pub mod reader;

pub use decoder::{DEFAULT_MAX_EVENT_SIZE, EventDecoder, decode_all};
pub use event::{EventKind, StreamEvent};
pub use negotiator::{DiscoveredEndpoint, discover_endpoint, resolve_endpoint, session_id_for};
pub use reader::{ByteStream, EventReader};
