//! Layered client configuration
//!
//! Built-in defaults, then the `--config` file, then `MCPLINK_*` environment variables,
//! then command-line flags. Later layers win.
//!
//! Variables backing a flag (`MCPLINK_CONFIG`, `MCPLINK_TOKEN`, `MCPLINK_CREDENTIAL`)
//! reach the configuration through that flag only, never through the environment layer.

use config::{Config, Environment, File, Map, Source};
use mcplink_client::{ClientConfig, CredentialHeader};
use tracing::debug;

use crate::cli::GlobalArgs;
use crate::error::{CliError, CliResult};

/// Prefix of environment variables read as configuration
pub const ENV_PREFIX: &str = "MCPLINK";

/// Environment variables owned by command-line flags
const FLAG_VARS: [&str; 3] = ["MCPLINK_CONFIG", "MCPLINK_TOKEN", "MCPLINK_CREDENTIAL"];

/// Resolve the client configuration for one invocation
///
/// # Errors
///
/// [`CliError::Config`] if a layer cannot be read or deserialized,
/// [`CliError::InvalidArguments`] for inconsistent credential flags and
/// [`CliError::Client`] if the merged configuration is unusable.
pub fn load(args: &GlobalArgs) -> CliResult<ClientConfig> {
    let file = args
        .config
        .as_deref()
        .map(|path| File::from(path).required(true));
    let vars = std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)));
    let mut config = layered(file, environment(vars))?;
    apply_flags(args, &mut config)?;
    config.validate()?;
    debug!(?config, "Resolved configuration");
    Ok(config)
}

/// Environment layer over `vars`, minus the flag-owned variables
pub(crate) fn environment<I>(vars: I) -> Environment
where
    I: IntoIterator<Item = (String, String)>,
{
    let source: Map<String, String> = vars
        .into_iter()
        .filter(|(name, _)| !FLAG_VARS.iter().any(|flag| flag.eq_ignore_ascii_case(name)))
        .collect();
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .ignore_empty(true)
        .source(Some(source))
}

pub(crate) fn layered<S>(file: Option<S>, env: Environment) -> CliResult<ClientConfig>
where
    S: Source + Send + Sync + 'static,
{
    let mut builder = Config::builder();
    if let Some(file) = file {
        builder = builder.add_source(file);
    }
    let config = builder.add_source(env).build()?.try_deserialize()?;
    Ok(config)
}

pub(crate) fn apply_flags(args: &GlobalArgs, config: &mut ClientConfig) -> CliResult<()> {
    if let Some(url) = &args.url {
        config.sse_url.clone_from(url);
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout = timeout;
    }
    if let Some(token) = &args.token {
        config.auth_token = Some(token.clone());
    }

    let configured_header = config.credential.as_ref().map(|c| c.header.clone());
    let configured_secret = config.credential.as_ref().map(|c| c.secret.clone());
    match (
        args.credential_header.clone().or(configured_header),
        args.credential.clone().or(configured_secret),
    ) {
        (Some(header), Some(secret)) => config.credential = Some(CredentialHeader::new(header, secret)),
        (None, None) => {}
        (None, Some(_)) => {
            return Err(CliError::InvalidArguments(
                "--credential needs --credential-header to name the header".to_string(),
            ));
        }
        (Some(header), None) => {
            return Err(CliError::InvalidArguments(format!(
                "no credential value for header {header}; pass --credential or set MCPLINK_CREDENTIAL"
            )));
        }
    }

    for (name, value) in &args.headers {
        config.headers.insert(name.clone(), value.clone());
    }
    Ok(())
}
