//! Command execution using mcplink-client

use mcplink_client::{Client, ClientConfig, ToolArguments};
use serde_json::Value;
use tracing::info;

use crate::cli::{Commands, ToolCommands};
use crate::error::{CliError, CliResult};
use crate::formatter::{Formatter, ProbeReport, tool_summaries};

/// Execute CLI commands
#[derive(Debug)]
pub struct CommandExecutor {
    formatter: Formatter,
    config: ClientConfig,
}

impl CommandExecutor {
    /// Executor that opens sessions with `config`
    #[must_use]
    pub fn new(formatter: Formatter, config: ClientConfig) -> Self {
        Self { formatter, config }
    }

    /// Execute a command
    ///
    /// # Errors
    ///
    /// Any session or request error, or [`CliError::InvalidArguments`] for tool
    /// arguments that are not a JSON object.
    pub async fn execute(&self, command: Commands) -> CliResult<()> {
        match command {
            Commands::Probe => self.probe().await,
            Commands::Tools(ToolCommands::List) => self.tools_list().await,
            Commands::Tools(ToolCommands::Call { name, arguments }) => {
                // Validate before opening a session
                let arguments = parse_arguments(&arguments)?;
                self.tools_call(&name, arguments).await
            }
        }
    }

    async fn probe(&self) -> CliResult<()> {
        let client = self.open().await?;
        let listing = client.list_tools(self.config.request_timeout).await;
        client.close();

        let report = ProbeReport {
            endpoint: client.endpoint().to_string(),
            session_id: client.session_id().to_string(),
            server: client.server_info().unwrap_or(Value::Null),
            tools: tool_summaries(&listing?)
                .into_iter()
                .map(|tool| tool.name)
                .collect(),
        };
        self.formatter.display_probe(&report)
    }

    async fn tools_list(&self) -> CliResult<()> {
        let client = self.open().await?;
        let listing = client.list_tools(self.config.request_timeout).await;
        client.close();
        self.formatter.display_tools(&listing?)
    }

    async fn tools_call(&self, name: &str, arguments: ToolArguments) -> CliResult<()> {
        let client = self.open().await?;
        let result = client
            .invoke(name, arguments, self.config.request_timeout)
            .await;
        client.close();
        self.formatter.display_call_result(&result?)
    }

    async fn open(&self) -> CliResult<Client> {
        let client = Client::open(self.config.clone()).await?;
        info!(
            session_id = client.session_id(),
            endpoint = %client.endpoint(),
            "Session ready"
        );
        Ok(client)
    }
}

/// Parse `--arguments` into a tool argument map
///
/// # Errors
///
/// [`CliError::InvalidArguments`] unless the text is empty or a JSON object.
pub fn parse_arguments(text: &str) -> CliResult<ToolArguments> {
    if text.trim().is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(CliError::InvalidArguments(format!(
            "Invalid JSON arguments: {e}"
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
