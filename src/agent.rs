//! Polling harness
//!
//! Drives a [`Collector`] on a fixed interval until shutdown and renders the
//! `--validate` and `--dry-run` reports.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::cli::OutputFormat;
use crate::collector::{CollectResult, Collector, PollReport, Transport};
use crate::config::Config;
use crate::error::AppResult;
use crate::sink::Sink;

/// Run one poll cycle and flush the sink
pub async fn poll_once<T: Transport>(
    collector: &Collector<T>,
    sink: &mut dyn Sink,
) -> AppResult<PollReport> {
    let report = collector.poll(sink).await?;
    sink.flush()?;
    info!(
        emitted = report.emitted,
        failures = report.failures.len(),
        "Poll cycle finished"
    );
    Ok(report)
}

/// Poll every `interval` until Ctrl+C or SIGTERM
///
/// Cycles never overlap: a slow cycle delays the next tick. Fatal errors
/// are logged and the next cycle runs as scheduled.
pub async fn run<T: Transport>(
    collector: &Collector<T>,
    sink: &mut dyn Sink,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(interval_ms = interval.as_millis() as u64, "Polling started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = poll_once(collector, sink).await {
                    error!(error = %e, "Poll cycle failed");
                }
            }
        }
    }

    info!("Polling stopped");
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}

/// Summary printed by `--validate`
pub fn validate_summary(config: &Config, format: OutputFormat) -> String {
    match format {
        OutputFormat::Line => format!(
            "Configuration is valid\n  mode: {}\n  context: {}\n  servers: {}\n  metrics: {}\n  interval: {}ms\n",
            config.mode,
            config.context,
            config.servers.len(),
            config.metrics.len(),
            config.interval.as_millis()
        ),
        OutputFormat::Json => json!({
            "valid": true,
            "mode": config.mode.to_string(),
            "context": config.context,
            "servers": config.servers.len(),
            "metrics": config.metrics.len(),
            "interval_ms": config.interval.as_millis() as u64,
        })
        .to_string(),
    }
}

/// Every request one poll cycle would send, rendered without network I/O
pub fn dry_run<T: Transport>(
    config: &Config,
    collector: &Collector<T>,
    format: OutputFormat,
) -> CollectResult<String> {
    let mut entries = Vec::new();
    for server in &config.servers {
        for metric in &config.metrics {
            let request = collector.requests().build(server, metric)?;
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            entries.push((server.name.as_str(), metric.name.as_str(), request, body));
        }
    }

    let rendered: String = match format {
        OutputFormat::Line => entries
            .iter()
            .map(|(server, metric, request, body)| {
                format!(
                    "[{} / {}] {} {}\n  {}\n",
                    server, metric, request.method, request.url, body
                )
            })
            .collect(),
        OutputFormat::Json => Value::Array(
            entries
                .iter()
                .map(|(server, metric, request, body)| {
                    json!({
                        "server": server,
                        "metric": metric,
                        "method": request.method.as_str(),
                        "url": request.url.as_str(),
                        "body": body,
                    })
                })
                .collect(),
        )
        .to_string(),
    };

    Ok(rendered)
}
