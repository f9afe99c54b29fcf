//! Configuration management for rjmx-poller
//!
//! Handles loading and validating configuration from YAML files.
//! Defaults are applied while deserializing, so every field of a loaded
//! [`Config`] is ready to use.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// How requests reach the JMX targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every server runs its own Jolokia agent
    #[default]
    Direct,
    /// A single Jolokia agent relays reads to remote JMX targets
    Proxy,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Direct => write!(f, "direct"),
            Mode::Proxy => write!(f, "proxy"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Context root used to compose the Jolokia URL (needs a trailing slash)
    #[serde(default = "default_context")]
    pub context: String,

    /// Deployment mode
    #[serde(default)]
    pub mode: Mode,

    /// Proxy agent, required in proxy mode
    #[serde(default)]
    pub proxy: Option<ServerConfig>,

    /// Polled servers
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Metrics read from every server
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,

    /// Separator used when composing nested field names
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Talk HTTPS to agents in direct mode
    #[serde(default)]
    pub https: bool,

    /// CA certificate (PEM) trusted in addition to the system roots
    #[serde(default)]
    pub ssl_ca: Option<String>,

    /// Client certificate (PEM)
    #[serde(default)]
    pub ssl_cert: Option<String>,

    /// Client private key (PEM)
    #[serde(default)]
    pub ssl_key: Option<String>,

    /// Skip certificate chain and host verification
    #[serde(default, alias = "InsecureSkipVerify")]
    pub insecure_skip_verify: bool,

    /// Sent verbatim as the `Authorization` header when non-empty
    #[serde(default)]
    pub jmx_auth: String,

    /// Time to wait for response headers after writing the request
    #[serde(
        default = "default_response_header_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub response_header_timeout: Duration,

    /// Overall time limit of one request, body included
    #[serde(
        default = "default_client_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub client_timeout: Duration,

    /// Poll interval used by the binary
    #[serde(default = "default_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

/// One Jolokia agent (direct mode) or JMX target (proxy mode)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Name reported in the `jolokia_name` tag
    #[serde(default)]
    pub name: String,

    /// Host name or address
    pub host: String,

    /// Port, kept as text because it is also emitted as a tag
    #[serde(deserialize_with = "deserialize_port")]
    pub port: String,

    /// Optional username
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password
    #[serde(default)]
    pub password: Option<String>,
}

/// One metric definition, shared by all servers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricConfig {
    /// Field name prefix
    pub name: String,

    /// MBean ObjectName or pattern
    pub mbean: String,

    /// Comma-joined attribute list
    #[serde(default)]
    pub attribute: Option<String>,

    /// Inner path, only sent together with an attribute
    #[serde(default)]
    pub path: Option<String>,

    /// ObjectName keys turned into tags (`*domain` adds the domain)
    #[serde(default, alias = "tagsFromMbean")]
    pub tags_from_mbean: Vec<String>,
}

// Default value functions
fn default_context() -> String {
    "/jolokia/".to_string()
}

fn default_delimiter() -> String {
    "_".to_string()
}

fn default_response_header_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_client_timeout() -> Duration {
    Duration::from_secs(4)
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: default_context(),
            mode: Mode::default(),
            proxy: None,
            servers: vec![],
            metrics: vec![],
            delimiter: default_delimiter(),
            https: false,
            ssl_ca: None,
            ssl_cert: None,
            ssl_key: None,
            insecure_skip_verify: false,
            jmx_auth: String::new(),
            response_header_timeout: default_response_header_timeout(),
            client_timeout: default_client_timeout(),
            interval: default_interval(),
        }
    }
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*(ms|s|m|h)?\s*$").expect("duration pattern is valid")
});

/// Parse a duration such as `500ms`, `3s`, `2m` or `1h`. A bare number is seconds.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let caps = DURATION_RE.captures(text)?;
    let amount: u64 = caps[1].parse().ok()?;
    let duration = match caps.get(2).map(|m| m.as_str()) {
        Some("ms") => Duration::from_millis(amount),
        Some("m") => Duration::from_secs(amount.checked_mul(60)?),
        Some("h") => Duration::from_secs(amount.checked_mul(3600)?),
        _ => Duration::from_secs(amount),
    };
    Some(duration)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationRepr::deserialize(deserializer)? {
        DurationRepr::Seconds(secs) => Ok(Duration::from_secs(secs)),
        DurationRepr::Text(text) => parse_duration(&text).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid duration '{}', expected e.g. '500ms', '3s', '2m'",
                text
            ))
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => port.to_string(),
        PortRepr::Text(port) => port,
    })
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.context.starts_with('/') || !self.context.ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "context '{}' must start and end with '/'",
                self.context
            )));
        }

        if self.mode == Mode::Proxy && self.proxy.is_none() {
            return Err(ConfigError::ValidationError(
                "mode 'proxy' requires a proxy section".to_string(),
            ));
        }

        if self.ssl_cert.is_some() != self.ssl_key.is_some() {
            return Err(ConfigError::ValidationError(
                "ssl_cert and ssl_key must be set together".to_string(),
            ));
        }

        if self.response_header_timeout.is_zero() || self.client_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "interval must be greater than 0".to_string(),
            ));
        }

        for (index, server) in self.servers.iter().chain(self.proxy.iter()).enumerate() {
            if server.host.is_empty() || server.port.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "server at index {} needs both host and port",
                    index
                )));
            }
        }

        for (index, metric) in self.metrics.iter().enumerate() {
            if metric.name.is_empty() || metric.mbean.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "metric at index {} needs both name and mbean",
                    index
                )));
            }
        }

        Ok(())
    }
}
