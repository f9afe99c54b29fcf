//! CLI argument parsing for rjmx-poller
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: RJMX_POLLER_CONFIG)
//! - `--interval`: Poll interval, e.g. `10s` (overrides config file, env: RJMX_POLLER_INTERVAL)
//! - `--once`: Run a single poll cycle and exit
//! - `--validate`: Validate configuration without polling
//! - `--dry-run`: Print the requests a poll cycle would send, without network I/O
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: RJMX_POLLER_LOG_LEVEL)
//! - `--log-format`: Log output format (text/json)
//! - `--output-format`: Metric output format (line/json)
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::parse_duration;

/// rjmx-poller - Jolokia JMX metric poller written in Rust
///
/// Polls Jolokia agents on a fixed interval and writes every
/// flattened, tagged field-set to stdout.
#[derive(Parser, Debug)]
#[command(name = "rjmx-poller")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "RJMX_POLLER_CONFIG"
    )]
    pub config: PathBuf,

    /// Poll interval such as 500ms, 10s or 1m (overrides config file)
    #[arg(
        long,
        value_name = "DURATION",
        value_parser = parse_interval,
        env = "RJMX_POLLER_INTERVAL"
    )]
    pub interval: Option<Duration>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Validate configuration without polling
    #[arg(long)]
    pub validate: bool,

    /// Print the requests one poll cycle would send
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "RJMX_POLLER_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Metric output format (also used by --validate and --dry-run)
    #[arg(long, value_enum, default_value = "line")]
    pub output_format: OutputFormat,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    match parse_duration(s) {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(format!("invalid interval '{}', expected e.g. 500ms, 10s, 1m", s)),
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines
    Text,
    /// One JSON object per log event
    Json,
}

/// Metric output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// InfluxDB line protocol (plain text for --validate/--dry-run)
    Line,
    /// JSON lines
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Line => write!(f, "line"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
