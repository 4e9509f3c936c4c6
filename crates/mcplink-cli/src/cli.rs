//! Command-line argument parsing

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mcplink_client::parse_duration;
use tracing::Level;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "mcplink",
    version,
    about = "Probe and call tool servers that announce their command endpoint over an event stream",
    long_about = "mcplink opens the server's event stream, waits for the endpoint announcement,\n\
                  runs the initialize handshake and then issues tool requests.\n\n\
                  Configuration is layered: built-in defaults, then --config, then MCPLINK_*\n\
                  environment variables (nested keys use a double underscore, e.g.\n\
                  MCPLINK_CLIENT_INFO__NAME), then command-line flags.\n\n\
                  Secrets passed as flags may end up in shell history; prefer MCPLINK_TOKEN\n\
                  and MCPLINK_CREDENTIAL."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Flags shared by every subcommand
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Flags accepted by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (YAML, TOML or JSON, chosen by extension)
    #[arg(long, short = 'c', global = true, env = "MCPLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// URL of the server's event stream
    #[arg(long, short = 'u', global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Per-request timeout, e.g. 30s or 500ms
    #[arg(long, short = 't', global = true, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Bearer token sent in the Authorization header
    #[arg(long, global = true, env = "MCPLINK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Header name carrying the per-user credential, e.g. X-GroupMe-Access-Token
    #[arg(long, global = true)]
    pub credential_header: Option<String>,

    /// Per-user credential sent in --credential-header
    #[arg(long, global = true, env = "MCPLINK_CREDENTIAL", hide_env_values = true)]
    pub credential: Option<String>,

    /// Extra request header as NAME=VALUE (repeatable)
    #[arg(long = "header", short = 'H', global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl GlobalArgs {
    /// Log level selected by `-v`
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Open a session and report the endpoint, session id, server info and tools
    Probe,

    /// Tool operations
    #[command(subcommand)]
    Tools(ToolCommands),
}

/// Tool-related commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ToolCommands {
    /// List available tools
    List,

    /// Call a tool
    Call {
        /// Tool name
        name: String,

        /// Arguments as JSON object
        #[arg(long, short = 'a', default_value = "{}")]
        arguments: String,
    },
}

/// Output formats
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable with colors and tables
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    Compact,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    match parse_duration(value) {
        Ok(duration) if duration.is_zero() => Err("timeout must be greater than zero".to_string()),
        Ok(duration) => Ok(duration),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    let (name, header_value) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {value:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in {value:?}"));
    }
    Ok((name.to_string(), header_value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "mcplink",
            "tools",
            "call",
            "send_message",
            "--arguments",
            r#"{"group_id": "42"}"#,
            "--url",
            "http://localhost:8080/sse",
            "-f",
            "json",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Tools(ToolCommands::Call {
                name: "send_message".to_string(),
                arguments: r#"{"group_id": "42"}"#.to_string(),
            })
        );
        assert_eq!(cli.global.url.as_deref(), Some("http://localhost:8080/sse"));
        assert_eq!(cli.global.format, OutputFormat::Json);
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from([
            "mcplink",
            "--timeout",
            "500ms",
            "-H",
            "X-Client=nightly",
            "--header",
            "X-Trace = on",
            "probe",
        ])
        .unwrap();

        assert_eq!(cli.command, Commands::Probe);
        assert_eq!(cli.global.timeout, Some(Duration::from_millis(500)));
        assert_eq!(
            cli.global.headers,
            vec![
                ("X-Client".to_string(), "nightly".to_string()),
                ("X-Trace".to_string(), "on".to_string()),
            ]
        );
    }

    #[test]
    fn test_call_arguments_default_to_empty_object() {
        let cli = Cli::try_parse_from(["mcplink", "tools", "call", "ping"]).unwrap();
        match cli.command {
            Commands::Tools(ToolCommands::Call { arguments, .. }) => assert_eq!(arguments, "{}"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_flags() {
        assert!(Cli::try_parse_from(["mcplink", "probe", "--header", "no-equals"]).is_err());
        assert!(Cli::try_parse_from(["mcplink", "probe", "--header", "=value"]).is_err());
        assert!(Cli::try_parse_from(["mcplink", "probe", "--timeout", "0s"]).is_err());
        assert!(Cli::try_parse_from(["mcplink", "probe", "--timeout", "soon"]).is_err());
        assert!(Cli::try_parse_from(["mcplink", "probe", "--format", "yaml"]).is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        let level = |flags: &[&str]| {
            let mut argv = vec!["mcplink"];
            argv.extend_from_slice(flags);
            argv.push("probe");
            Cli::try_parse_from(argv).unwrap().global.log_level()
        };

        assert_eq!(level(&[]), Level::WARN);
        assert_eq!(level(&["-v"]), Level::INFO);
        assert_eq!(level(&["-vv"]), Level::DEBUG);
        assert_eq!(level(&["-vvvv"]), Level::TRACE);
    }

    #[test]
    fn test_header_value_may_contain_equals() {
        assert_eq!(
            parse_header("Authorization=Basic a2V5=").unwrap(),
            ("Authorization".to_string(), "Basic a2V5=".to_string())
        );
    }
}
