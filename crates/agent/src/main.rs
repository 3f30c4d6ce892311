//! Maintenance Agent - predictive maintenance runner
//!
//! Invoked on a schedule: restores the latest model snapshot, optionally
//! retrains it on the exported inventory, scores every tool and persists the
//! predictions for the alerting component.

use anyhow::{Context, Result};
use chrono::Utc;
use maintenance_engine::{EngineMetrics, JsonFileStore, MaintenanceEngine, StructuredLogger};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod runner;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load()?;
    info!(
        data_dir = %config.data_dir.display(),
        mode = config.mode.as_str(),
        "Agent configured"
    );

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(AGENT_VERSION, config.mode.as_str());

    let store = JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?
        .with_snapshots_to_keep(config.snapshots_to_keep);
    let engine = MaintenanceEngine::new(config.engine.clone(), Arc::new(store))?
        .with_logger(logger.clone());

    let result = runner::run(&engine, config.mode, Utc::now());

    let summary = export_metrics(result, config.metrics_path.as_deref())?;

    if let Some(path) = &config.recommendations_path {
        let json = serde_json::to_vec_pretty(&summary.recommendations)
            .context("Failed to serialize recommendations")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write recommendations to {:?}", path))?;
    }

    logger.log_finished(summary.predictions, summary.alerts, summary.model_version.as_deref());
    Ok(())
}

/// Write metrics even when the run failed; a failed write is logged and
/// never replaces the run's own error
fn export_metrics<T>(result: Result<T>, metrics_path: Option<&Path>) -> Result<T> {
    if let Some(path) = metrics_path {
        if let Err(e) = write_metrics(path) {
            warn!(error = %e, path = %path.display(), "Failed to write metrics");
        }
    }
    result
}

fn write_metrics(path: &Path) -> Result<()> {
    // make sure the metric families exist even if nothing was recorded
    EngineMetrics::new();
    let text = EngineMetrics::render()?;
    std::fs::write(path, text).with_context(|| format!("Failed to write metrics to {:?}", path))
}
