//! Probe command implementation

use crate::cli::output::{format_probe_json, format_probe_table, ProbeView};
use crate::cli::{load_config, ProbeArgs};
use crate::health::HealthMonitor;
use crate::registry::EngineRegistry;
use std::sync::Arc;

/// Handle `probe` command: one active probe round, results rendered.
pub async fn handle_probe(args: &ProbeArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let registry = Arc::new(EngineRegistry::from_config(&config.engines)?);
    let monitor = HealthMonitor::new(
        registry,
        config.health_check.clone(),
        config.circuit_breaker.clone(),
    );
    probe_once(&monitor, args.json).await
}

/// Probe every enabled engine once and render the results.
pub async fn probe_once(
    monitor: &HealthMonitor,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let views: Vec<ProbeView> = monitor
        .probe_all()
        .await
        .iter()
        .map(ProbeView::from)
        .collect();

    if views.is_empty() {
        return Ok("No enabled engines configured".to_string());
    }

    if json {
        Ok(format_probe_json(&views)?)
    } else {
        Ok(format_probe_table(&views))
    }
}
