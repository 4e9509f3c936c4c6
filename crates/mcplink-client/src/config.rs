//! Client configuration.
//!
//! Everything a session needs is passed in explicitly through [`ClientConfig`]; the
//! client keeps no global registry of servers.
//!
//! Durations accept either whole seconds (`30`) or a suffixed string (`"30s"`,
//! `"500ms"`, `"2m"`).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use mcplink_protocol::{Error, Implementation, PROTOCOL_VERSION, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Per-user secret injected as a named header on every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHeader {
    /// Header name, e.g. `X-GroupMe-Access-Token`
    pub header: String,
    /// Secret value
    pub secret: String,
}

impl CredentialHeader {
    /// Create a credential header
    pub fn new(header: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for CredentialHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHeader")
            .field("header", &self.header)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for one client session
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL of the event stream; its origin is the base for endpoint resolution
    pub sse_url: String,

    /// Protocol version declared in `initialize`
    pub protocol_version: String,

    /// Client identification sent in `initialize`
    pub client_info: Implementation,

    /// How long to wait for the endpoint event
    #[serde(with = "duration_serde")]
    pub negotiation_timeout: Duration,

    /// Bound on the `initialize` round trip
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Default timeout for tool calls issued without an explicit one
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Stall timeout for stream reads during negotiation
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Stall timeout for the established stream (`None`: wait indefinitely)
    #[serde(with = "optional_duration_serde")]
    pub idle_timeout: Option<Duration>,

    /// TCP/TLS connect timeout
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Bearer token for the `Authorization` header
    pub auth_token: Option<String>,

    /// Per-user credential header
    pub credential: Option<CredentialHeader>,

    /// Extra static headers sent with every request
    pub headers: HashMap<String, String>,

    /// User agent (`None` leaves reqwest's default)
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sse_url: "http://localhost:8080/sse".to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info: Implementation::default(),
            negotiation_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(10),
            idle_timeout: None,
            connect_timeout: Duration::from_secs(10),
            auth_token: None,
            credential: None,
            headers: HashMap::new(),
            user_agent: Some(format!("mcplink/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("sse_url", &self.sse_url)
            .field("protocol_version", &self.protocol_version)
            .field("client_info", &self.client_info)
            .field("negotiation_timeout", &self.negotiation_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("credential", &self.credential)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Default configuration pointed at `sse_url`
    pub fn new(sse_url: impl Into<String>) -> Self {
        Self {
            sse_url: sse_url.into(),
            ..Self::default()
        }
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the per-user credential header
    #[must_use]
    pub fn with_credential(mut self, header: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credential = Some(CredentialHeader::new(header, secret));
        self
    }

    /// Add a static header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the default request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Parsed stream URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `sse_url` is not an absolute `http(s)` URL.
    pub fn stream_url(&self) -> Result<Url> {
        let url = Url::parse(&self.sse_url)
            .map_err(|e| Error::configuration(format!("invalid sse_url {:?}: {e}", self.sse_url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::configuration(format!(
                "sse_url must be http or https, got {other:?}"
            ))),
        }
    }

    /// Check the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.stream_url()?;
        if self.protocol_version.trim().is_empty() {
            return Err(Error::configuration("protocol_version must not be empty"));
        }
        for (name, timeout) in [
            ("negotiation_timeout", self.negotiation_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("request_timeout", self.request_timeout),
            ("read_timeout", self.read_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::configuration(format!("{name} must be greater than zero")));
            }
        }
        if let Some(credential) = &self.credential
            && credential.header.trim().is_empty()
        {
            return Err(Error::configuration("credential header name must not be empty"));
        }
        Ok(())
    }
}

/// Parse `"30s"`, `"500ms"`, `"2m"`, `"1h"` or a bare number of seconds.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for anything else.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| Error::configuration(format!("invalid duration {text:?}")))?;
    let seconds = match unit.trim() {
        "" | "s" | "sec" | "secs" => value,
        "ms" => value / 1000.0,
        "m" | "min" | "mins" => value * 60.0,
        "h" => value * 3600.0,
        other => {
            return Err(Error::configuration(format!(
                "unknown duration unit {other:?} in {text:?}"
            )));
        }
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::configuration(format!("invalid duration {text:?}")));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn format_duration(duration: &Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Seconds(u64),
    Text(String),
}

impl DurationRepr {
    fn into_duration(self) -> Result<Duration> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => parse_duration(&text),
        }
    }
}

mod duration_serde {
    use super::{DurationRepr, format_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        DurationRepr::deserialize(deserializer)?
            .into_duration()
            .map_err(serde::de::Error::custom)
    }
}

mod optional_duration_serde {
    use super::{DurationRepr, format_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&format_duration(duration)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<DurationRepr>::deserialize(deserializer)?
            .map(DurationRepr::into_duration)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.protocol_version, "2024-11-05");
        assert_eq!(config.negotiation_timeout, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.idle_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_duration("ten seconds").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig = serde_json::from_value(json!({
            "sse_url": "https://gateway.example.com/servers/groupme/sse",
            "request_timeout": "45s",
            "read_timeout": 5,
            "idle_timeout": "2m",
            "credential": {"header": "X-GroupMe-Access-Token", "secret": "tok"}
        }))
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
        assert_eq!(
            config.credential.as_ref().map(|c| c.header.as_str()),
            Some("X-GroupMe-Access-Token")
        );
    }

    #[test]
    fn test_deserialize_yaml_file() {
        let yaml = r#"
sse_url: http://localhost:9000/sse
negotiation_timeout: 750ms
auth_token: gateway-token
headers:
  X-Client: nightly-job
"#;
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.negotiation_timeout, Duration::from_millis(750));
        assert_eq!(config.auth_token.as_deref(), Some("gateway-token"));
        assert_eq!(config.headers.get("X-Client").map(String::as_str), Some("nightly-job"));
        assert_eq!(config.stream_url().unwrap().port(), Some(9000));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ClientConfig::new("http://localhost/sse")
            .with_auth_token("bearer-secret")
            .with_credential("X-Token", "user-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("bearer-secret"));
        assert!(!rendered.contains("user-secret"));
        assert!(rendered.contains("X-Token"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ws://localhost/sse").validate().is_err());

        let mut config = ClientConfig::default();
        config.handshake_timeout = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("handshake_timeout"));
    }
}
