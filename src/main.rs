//! rjmx-poller - Jolokia JMX metric poller
//!
//! This binary polls the configured Jolokia agents on a fixed interval
//! and writes the collected metrics to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rjmx_poller::agent;
use rjmx_poller::cli::{Cli, OutputFormat};
use rjmx_poller::collector::Collector;
use rjmx_poller::config::Config;
use rjmx_poller::sink::{JsonSink, LineProtocolSink, Sink};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    rjmx_poller::init_logging(&cli.log_level.to_string(), cli.log_format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rjmx-poller");

    // Load configuration
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(interval) = cli.interval {
        config.interval = interval;
    }

    if cli.validate {
        println!("{}", agent::validate_summary(&config, cli.output_format).trim_end());
        return Ok(());
    }

    let collector = Collector::from_config(&config);

    if cli.dry_run {
        let rendered = agent::dry_run(&config, &collector, cli.output_format)?;
        println!("{}", rendered.trim_end());
        return Ok(());
    }

    let mut sink: Box<dyn Sink> = match cli.output_format {
        OutputFormat::Line => Box::new(LineProtocolSink::new(std::io::stdout())),
        OutputFormat::Json => Box::new(JsonSink::new(std::io::stdout())),
    };

    if cli.once {
        agent::poll_once(&collector, sink.as_mut()).await?;
        return Ok(());
    }

    agent::run(&collector, sink.as_mut(), config.interval).await;

    Ok(())
}
