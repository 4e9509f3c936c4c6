//! Output formatting for CLI

use comfy_table::{Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// What `mcplink probe` learned about a server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    /// Absolute command endpoint
    pub endpoint: String,
    /// Session id derived from the endpoint
    pub session_id: String,
    /// The server's `initialize` result
    pub server: Value,
    /// Tool names from `tools/list`
    pub tools: Vec<String>,
}

/// One row of a tool listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSummary {
    /// Tool name
    pub name: String,
    /// Description, if the server gave one
    pub description: Option<String>,
    /// Property names of the input schema
    pub arguments: Vec<String>,
}

/// Extract tool rows from an opaque `tools/list` result
pub fn tool_summaries(listing: &Value) -> Vec<ToolSummary> {
    let Some(tools) = listing.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name")?.as_str()?.to_string();
            let description = tool
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let arguments = tool
                .get("inputSchema")
                .and_then(|schema| schema.get("properties"))
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();
            Some(ToolSummary {
                name,
                description,
                arguments,
            })
        })
        .collect()
}

/// Format and display output based on format preference
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
}

impl Formatter {
    /// Create a formatter
    #[must_use]
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    /// Display a probe report
    ///
    /// # Errors
    ///
    /// [`CliError::Json`] if the report cannot be serialized.
    pub fn display_probe(&self, report: &ProbeReport) -> CliResult<()> {
        println!("{}", self.render_probe(report)?);
        Ok(())
    }

    /// Display a `tools/list` result
    ///
    /// # Errors
    ///
    /// [`CliError::Json`] if the listing cannot be serialized.
    pub fn display_tools(&self, listing: &Value) -> CliResult<()> {
        println!("{}", self.render_tools(listing)?);
        Ok(())
    }

    /// Display a tool call result
    ///
    /// # Errors
    ///
    /// [`CliError::Json`] if the result cannot be serialized.
    pub fn display_call_result(&self, result: &Value) -> CliResult<()> {
        println!("{}", self.render_call_result(result)?);
        Ok(())
    }

    /// Display error with suggestions on stderr
    pub fn display_error(&self, error: &CliError) {
        eprintln!("{}", self.render_error(error));
    }

    pub(crate) fn render_probe(&self, report: &ProbeReport) -> CliResult<String> {
        if self.format != OutputFormat::Human {
            return self.render_json(report);
        }

        let server_info = report.server.get("serverInfo");
        let field = |value: Option<&Value>| {
            value
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string()
        };

        let mut lines = vec![self.header("Session")];
        lines.push(self.kv("Endpoint", &report.endpoint));
        lines.push(self.kv("Session id", &report.session_id));
        lines.push(self.kv("Server", &field(server_info.and_then(|s| s.get("name")))));
        lines.push(self.kv("Version", &field(server_info.and_then(|s| s.get("version")))));
        lines.push(self.kv("Protocol", &field(report.server.get("protocolVersion"))));

        lines.push(String::new());
        lines.push(self.header(&format!("Tools ({})", report.tools.len())));
        if report.tools.is_empty() {
            lines.push("  (none)".to_string());
        }
        for name in &report.tools {
            lines.push(format!("  {name}"));
        }
        Ok(lines.join("\n"))
    }

    pub(crate) fn render_tools(&self, listing: &Value) -> CliResult<String> {
        if self.format != OutputFormat::Human {
            return self.render_json(listing);
        }

        let tools = tool_summaries(listing);
        if tools.is_empty() {
            return Ok("No tools available".to_string());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Name", "Description", "Arguments"]);
        for tool in &tools {
            let arguments = if tool.arguments.is_empty() {
                "-".to_string()
            } else {
                tool.arguments.join(", ")
            };
            table.add_row(vec![
                tool.name.as_str(),
                tool.description.as_deref().unwrap_or("-"),
                arguments.as_str(),
            ]);
        }
        Ok(format!("{table}\nTotal: {} tools", tools.len()))
    }

    pub(crate) fn render_call_result(&self, result: &Value) -> CliResult<String> {
        if self.format != OutputFormat::Human {
            return self.render_json(result);
        }

        // Text content blocks read better unquoted
        let texts: Option<Vec<&str>> = result
            .get("content")
            .and_then(Value::as_array)
            .filter(|blocks| !blocks.is_empty())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .map(|block| match block.get("type").and_then(Value::as_str) {
                        Some("text") => block.get("text").and_then(Value::as_str),
                        _ => None,
                    })
                    .collect()
            });

        let body = match (texts, result) {
            (Some(texts), _) => texts.join("\n"),
            (None, Value::String(text)) => text.clone(),
            (None, other) => serde_json::to_string_pretty(other)?,
        };

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let label = if self.colored {
                "Tool reported an error:".bright_red().bold().to_string()
            } else {
                "Tool reported an error:".to_string()
            };
            return Ok(format!("{label}\n{body}"));
        }
        Ok(body)
    }

    pub(crate) fn render_error(&self, error: &CliError) -> String {
        let category = error.category();
        let mut out = if self.colored {
            format!(
                "{} [{}]: {}",
                "Error".bright_red().bold(),
                category.yellow(),
                error
            )
        } else {
            format!("Error [{category}]: {error}")
        };

        let suggestions = error.suggestions();
        if !suggestions.is_empty() {
            if self.colored {
                out.push_str(&format!("\n\n{}", "Suggestions:".bright_yellow().bold()));
            } else {
                out.push_str("\n\nSuggestions:");
            }
            for suggestion in suggestions {
                if self.colored {
                    out.push_str(&format!("\n  {} {}", "•".bright_blue(), suggestion));
                } else {
                    out.push_str(&format!("\n  • {suggestion}"));
                }
            }
        }
        out
    }

    fn render_json<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<String> {
        let rendered = match self.format {
            OutputFormat::Compact => serde_json::to_string(value)?,
            _ => serde_json::to_string_pretty(value)?,
        };
        Ok(rendered)
    }

    fn header(&self, text: &str) -> String {
        if self.colored {
            text.bright_cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn kv(&self, key: &str, value: &str) -> String {
        if self.colored {
            format!("  {:<11} {}", format!("{key}:").bright_black(), value)
        } else {
            format!("  {:<11} {}", format!("{key}:"), value)
        }
    }
}
