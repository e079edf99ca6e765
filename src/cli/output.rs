//! Output formatting helpers for CLI commands

use crate::health::{HealthStatus, ProbeOutcome};
use crate::registry::EngineSettings;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

/// View model for engine display
#[derive(Debug, Clone, Serialize)]
pub struct EngineView {
    pub name: String,
    pub url: String,
    pub model: String,
    pub enabled: bool,
    pub capabilities: Vec<&'static str>,
    pub max_concurrent: u32,
}

impl From<&EngineSettings> for EngineView {
    fn from(engine: &EngineSettings) -> Self {
        let mut capabilities = Vec::new();
        if engine.supports_tools {
            capabilities.push("tools");
        }
        if engine.supports_structured_output {
            capabilities.push("structured");
        }
        Self {
            name: engine.name.clone(),
            url: engine.url.clone(),
            model: engine.model.clone(),
            enabled: engine.enabled,
            capabilities,
            max_concurrent: engine.max_concurrent,
        }
    }
}

/// View model for one probe result
#[derive(Debug, Clone, Serialize)]
pub struct ProbeView {
    pub engine: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProbeOutcome> for ProbeView {
    fn from(outcome: &ProbeOutcome) -> Self {
        let (latency_ms, error) = match &outcome.result {
            Ok(latency) => (Some(latency.as_millis() as u64), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            engine: outcome.engine.clone(),
            status: outcome.status,
            latency_ms,
            error,
        }
    }
}

/// Format engines as a table
pub fn format_engines_table(engines: &[EngineView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Name",
        "URL",
        "Model",
        "Enabled",
        "Capabilities",
        "Max Concurrent",
    ]);

    for e in engines {
        let enabled = if e.enabled {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        };

        table.add_row(vec![
            Cell::new(&e.name),
            Cell::new(&e.url),
            Cell::new(&e.model),
            Cell::new(enabled),
            Cell::new(e.capabilities.join(", ")),
            Cell::new(e.max_concurrent),
        ]);
    }

    table.to_string()
}

/// Format engines as JSON
pub fn format_engines_json(engines: &[EngineView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "engines": engines }))
}

/// Format probe results as a table
pub fn format_probe_table(results: &[ProbeView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Engine", "Status", "Latency", "Error"]);

    for r in results {
        table.add_row(vec![
            Cell::new(&r.engine),
            Cell::new(format!("{} {}", status_icon(r.status), colored_status(r.status))),
            Cell::new(
                r.latency_ms
                    .map(|ms| format!("{}ms", ms))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(r.error.as_deref().unwrap_or("")),
        ]);
    }

    table.to_string()
}

/// Format probe results as JSON
pub fn format_probe_json(results: &[ProbeView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "results": results }))
}

/// Status name colored for terminal output
pub fn colored_status(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "HEALTHY".green().to_string(),
        HealthStatus::Degraded => "DEGRADED".yellow().to_string(),
        HealthStatus::Unhealthy => "UNHEALTHY".red().to_string(),
        HealthStatus::Unknown => "UNKNOWN".dimmed().to_string(),
    }
}

/// Get status icon for health status
pub fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "✓",
        HealthStatus::Degraded => "~",
        HealthStatus::Unhealthy => "✗",
        HealthStatus::Unknown => "?",
    }
}
