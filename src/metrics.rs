//! Command Metrics
//!
//! Prometheus counters and histograms for the command surface. Each
//! orchestrator owns its own registry so independent instances (and tests)
//! never collide on metric names.

use crate::error::{Error, Result};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Label value for a successful command
pub const OUTCOME_OK: &str = "ok";

/// Metrics recorded per command
pub struct Metrics {
    registry: Registry,
    commands_total: CounterVec,
    command_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let commands_total = CounterVec::new(
            Opts::new("xylem_commands_total", "Commands handled, by outcome"),
            &["command", "outcome"],
        )
        .map_err(metrics_error)?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new(
                "xylem_command_duration_seconds",
                "Duration of command handling in seconds",
            )
            .buckets(vec![0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 60.0, 120.0]),
            &["command"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(commands_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(command_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            commands_total,
            command_duration,
        })
    }

    /// Record one handled command
    pub fn observe(&self, command: &str, outcome: &str, elapsed: Duration) {
        self.commands_total
            .with_label_values(&[command, outcome])
            .inc();
        self.command_duration
            .with_label_values(&[command])
            .observe(elapsed.as_secs_f64());
    }

    /// Prometheus text exposition
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics encoding: {}", e)))
    }

    /// Content type of [`Metrics::encode`]
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
