//! # mcplink protocol
//!
//! Wire-level vocabulary shared by the mcplink crates:
//!
//! - [`jsonrpc`]: the JSON-RPC 2.0 request / notification / response envelope
//! - [`types`]: handshake and tool dispatch params
//! - [`error`]: the [`Error`] taxonomy every layer reports through
//!
//! Nothing in here performs I/O.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod error;
pub mod jsonrpc;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcResponsePayload, JsonRpcVersion, RequestId,
};
pub use types::{CallToolParams, Implementation, InitializeParams, ToolArguments};

/// Protocol version declared in `initialize` unless configured otherwise
pub const PROTOCOL_VERSION: &str = "2024-11-05";
