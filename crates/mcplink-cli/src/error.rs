//! CLI error type with remediation hints

use std::fmt;

use mcplink_protocol::ErrorKind;
use thiserror::Error;

/// Result alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced to the operator
#[derive(Error, Debug)]
pub enum CliError {
    /// Session establishment or a request failed
    #[error(transparent)]
    Client(#[from] mcplink_protocol::Error),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Hints for resolving the error, most likely first
    pub fn suggestions(&self) -> Vec<&'static str> {
        let Self::Client(err) = self else {
            return match self {
                Self::InvalidArguments(_) => vec![
                    "Tool arguments must be a JSON object, e.g. --arguments '{\"text\": \"hi\"}'",
                    "Use --help to see expected format",
                ],
                Self::Config(_) => vec![
                    "Check the file passed to --config (YAML, TOML or JSON by extension)",
                    "Durations are whole seconds or suffixed strings like \"30s\" or \"500ms\"",
                ],
                _ => vec![],
            };
        };

        match err.kind() {
            ErrorKind::TransportClosed | ErrorKind::Send => vec![
                "Check if the server is running",
                "Verify --url points at the event stream (usually ending in /sse)",
                "Check --token and the credential header if the server requires auth",
            ],
            ErrorKind::TransportTimeout | ErrorKind::NegotiationTimeout => vec![
                "Verify --url points at the event stream, not the message endpoint",
                "Raise negotiation_timeout or read_timeout in the config file",
            ],
            ErrorKind::InvalidEndpoint => vec![
                "The server announced an endpoint that cannot be used; check its configuration",
            ],
            ErrorKind::HandshakeFailed => vec![
                "Check that the server speaks protocol version 2024-11-05",
                "Check server logs for initialization errors",
            ],
            ErrorKind::RequestTimeout => vec![
                "Increase timeout with --timeout flag",
                "Check server responsiveness",
            ],
            ErrorKind::ToolInvocation => vec![
                "Run 'mcplink tools list' to check the tool name and its arguments",
            ],
            ErrorKind::Configuration => vec![
                "The stream URL must use http or https",
                "Header names and values must be valid HTTP header text",
            ],
            _ => vec![],
        }
    }

    /// Error category for colored output
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Client(err) => match err.kind() {
                ErrorKind::TransportClosed
                | ErrorKind::TransportTimeout
                | ErrorKind::InvalidEndpoint
                | ErrorKind::NegotiationTimeout
                | ErrorKind::Send
                | ErrorKind::SessionClosed => ErrorCategory::Connection,
                ErrorKind::HandshakeFailed | ErrorKind::SessionNotReady => ErrorCategory::Session,
                ErrorKind::RequestTimeout => ErrorCategory::Timeout,
                ErrorKind::ToolInvocation => ErrorCategory::Server,
                ErrorKind::Configuration => ErrorCategory::Config,
                _ => ErrorCategory::Other,
            },
            Self::InvalidArguments(_) => ErrorCategory::User,
            Self::Config(_) => ErrorCategory::Config,
            Self::Json(_) => ErrorCategory::Other,
        }
    }
}

/// Error categories for colored output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Stream or endpoint problems
    Connection,
    /// Handshake or session state problems
    Session,
    /// A request timed out
    Timeout,
    /// The server returned an error object
    Server,
    /// Bad command-line input
    User,
    /// Bad configuration
    Config,
    /// Anything else
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::Session => write!(f, "Session"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Server => write!(f, "Server"),
            Self::User => write!(f, "User Input"),
            Self::Config => write!(f, "Configuration"),
            Self::Other => write!(f, "Error"),
        }
    }
}
