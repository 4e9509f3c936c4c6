//! # mcplink CLI
//!
//! Command-line interface for servers that announce their command endpoint over an
//! event stream. Replaces ad-hoc debug scripts: it opens the stream, discovers the
//! endpoint, runs the handshake and issues tool requests.
//!
//! ## Usage
//!
//! ```bash
//! # What does the server negotiate?
//! mcplink probe --url http://localhost:8080/sse
//!
//! # List tools as JSON
//! mcplink tools list --url http://localhost:8080/sse --format json
//!
//! # Call a tool with a per-user credential header
//! MCPLINK_CREDENTIAL=... mcplink tools call send_message \
//!   --credential-header X-GroupMe-Access-Token \
//!   --arguments '{"group_id": "42", "text": "hello"}'
//! ```
//!
//! Logs go to stderr; stdout carries only command output.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod cli;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod settings;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

pub use cli::{Cli, Commands, GlobalArgs, OutputFormat, ToolCommands};
pub use error::{CliError, CliResult};
pub use executor::CommandExecutor;
pub use formatter::Formatter;

/// Parse arguments, run the command and report any error on stderr
///
/// # Errors
///
/// The command's error, already displayed with suggestions.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.log_level());

    let formatter = Formatter::new(cli.global.format, !cli.global.no_color);
    let result = execute(cli, formatter).await;
    if let Err(e) = &result {
        formatter.display_error(e);
    }
    result
}

async fn execute(cli: Cli, formatter: Formatter) -> CliResult<()> {
    let config = settings::load(&cli.global)?;
    CommandExecutor::new(formatter, config)
        .execute(cli.command)
        .await
}

/// `RUST_LOG` wins; otherwise `level` applies to everything
fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
