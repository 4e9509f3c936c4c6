//! Handshake and tool dispatch payloads.
//!
//! Only the envelope fields the client has to produce are typed. Results coming back
//! from the server stay opaque [`Value`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Method that opens the capability handshake
pub const METHOD_INITIALIZE: &str = "initialize";

/// Notification that closes the capability handshake
pub const METHOD_INITIALIZED: &str = "notifications/initialized";

/// Method listing the tools a server exposes
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Method executing a named tool
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Argument map passed to a tool: string keys to arbitrary JSON values
pub type ToolArguments = Map<String, Value>;

/// Name and version of one side of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: "mcplink".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Params of the `initialize` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version string the client declares
    pub protocol_version: String,
    /// Declared client capabilities (empty object by default)
    pub capabilities: Value,
    /// Client identification
    pub client_info: Implementation,
}

impl InitializeParams {
    /// Params declaring `protocol_version` with an empty capability set
    pub fn new(protocol_version: impl Into<String>, client_info: Implementation) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: Value::Object(Map::new()),
            client_info,
        }
    }
}

/// Params of a `tools/call` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name
    pub name: String,
    /// Tool arguments
    pub arguments: ToolArguments,
}

impl CallToolParams {
    /// Create tool call params
    pub fn new(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
