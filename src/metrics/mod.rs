//! # Metrics Collection Module
//!
//! Prometheus export of gateway metrics through the `metrics` facade.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `gateway_engine_selections_total{engine}` - Routing decisions
//! - `gateway_errors_total{engine, kind}` - Terminal error events by kind
//!
//! **Histograms:**
//! - `gateway_ttft_seconds{engine}` - Time to first token (successful streams)
//! - `gateway_request_duration_seconds{engine, outcome}` - Whole-stream duration
//! - `gateway_probe_latency_seconds{engine}` - Active probe latency
//!
//! **Gauges:**
//! - `gateway_admission_in_flight{engine}` - Admitted requests per engine

pub mod handler;

use std::time::{Duration, Instant};

pub const ENGINE_SELECTIONS_TOTAL: &str = "gateway_engine_selections_total";
pub const ERRORS_TOTAL: &str = "gateway_errors_total";
pub const TTFT_SECONDS: &str = "gateway_ttft_seconds";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
pub const PROBE_LATENCY_SECONDS: &str = "gateway_probe_latency_seconds";
pub const ADMISSION_IN_FLIGHT: &str = "gateway_admission_in_flight";

/// Engine label used when a request fails before an engine is chosen.
pub const NO_ENGINE: &str = "none";

/// Holds the Prometheus handle and process start time.
pub struct MetricsCollector {
    start_time: Instant,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            start_time,
            prometheus_handle,
        }
    }

    /// Get uptime in seconds since gateway startup.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Initialize the Prometheus exporter with latency buckets sized for
/// LLM inference: [0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10, 30, 60, 120, 300] seconds.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let buckets = &[
        0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(TTFT_SECONDS.to_string()), buckets)?
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            buckets,
        )?
        .set_buckets_for_metric(Matcher::Full(PROBE_LATENCY_SECONDS.to_string()), buckets)?
        .install_recorder()?;

    Ok(handle)
}

/// Build a handle without installing a global recorder.
///
/// Used when a recorder is already installed (tests, repeated router builds).
pub fn detached_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle()
}

/// Count one terminal error event.
pub fn record_error(engine: &str, kind: &str) {
    metrics::counter!(ERRORS_TOTAL,
        "engine" => engine.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Outcome label for the request duration histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    Cancelled,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Records request duration when dropped.
///
/// The outcome starts as `cancelled`, so a stream dropped by a disconnecting
/// caller is still counted.
pub struct RequestRecorder {
    engine: String,
    started: Instant,
    first_token: Option<Duration>,
    outcome: Outcome,
}

impl RequestRecorder {
    pub fn new(engine: impl Into<String>, started: Instant) -> Self {
        Self {
            engine: engine.into(),
            started,
            first_token: None,
            outcome: Outcome::Cancelled,
        }
    }

    /// Mark the stream successful and record its time to first token.
    pub fn succeeded(&mut self) {
        self.outcome = Outcome::Success;
        if let Some(ttft) = self.first_token {
            metrics::histogram!(TTFT_SECONDS, "engine" => self.engine.clone())
                .record(ttft.as_secs_f64());
        }
    }

    pub fn failed(&mut self) {
        self.outcome = Outcome::Error;
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Note the arrival of the first token. Only the first call counts; the
    /// histogram is written by [`RequestRecorder::succeeded`].
    pub fn first_token(&mut self) {
        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
    }

    pub fn time_to_first_token(&self) -> Option<Duration> {
        self.first_token
    }
}

impl Drop for RequestRecorder {
    fn drop(&mut self) {
        metrics::histogram!(REQUEST_DURATION_SECONDS,
            "engine" => self.engine.clone(),
            "outcome" => self.outcome.as_str()
        )
        .record(self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, Once};

    static INIT: Once = Once::new();
    static TEST_HANDLE: Mutex<Option<metrics_exporter_prometheus::PrometheusHandle>> =
        Mutex::new(None);

    fn get_test_handle() -> metrics_exporter_prometheus::PrometheusHandle {
        INIT.call_once(|| {
            // Use build_recorder which doesn't need a runtime
            let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            *TEST_HANDLE.lock().unwrap() = Some(handle);

            // Install the recorder globally (only once for all tests)
            metrics::set_global_recorder(Box::new(recorder)).ok();
        });

        TEST_HANDLE.lock().unwrap().as_ref().unwrap().clone()
    }

    #[test]
    fn test_collector_uptime() {
        let collector = MetricsCollector::new(Instant::now(), get_test_handle());
        assert!(collector.uptime_seconds() < 1);
    }

    #[test]
    fn test_recorder_defaults_to_cancelled() {
        let mut recorder = RequestRecorder::new("fast-local", Instant::now());
        assert_eq!(recorder.outcome(), Outcome::Cancelled);
        recorder.succeeded();
        assert_eq!(recorder.outcome(), Outcome::Success);
        recorder.failed();
        assert_eq!(recorder.outcome(), Outcome::Error);
    }

    #[test]
    fn test_dropped_recorder_renders_duration() {
        let handle = get_test_handle();
        {
            let _recorder = RequestRecorder::new("metrics-test-engine", Instant::now());
        }
        record_error("metrics-test-engine", "stream_error");

        let rendered = MetricsCollector::new(Instant::now(), handle).render_metrics();
        assert!(rendered.contains(REQUEST_DURATION_SECONDS));
        assert!(rendered.contains("outcome=\"cancelled\""));
        assert!(rendered.contains("kind=\"stream_error\""));
    }

    #[test]
    fn test_ttft_recorded_only_for_successful_streams() {
        let handle = get_test_handle();
        {
            let mut failed = RequestRecorder::new("ttft-failed-engine", Instant::now());
            failed.first_token();
            failed.failed();
        }
        {
            let mut ok = RequestRecorder::new("ttft-ok-engine", Instant::now());
            ok.first_token();
            let first = ok.time_to_first_token();
            ok.first_token();
            assert_eq!(ok.time_to_first_token(), first);
            ok.succeeded();
        }

        let rendered = MetricsCollector::new(Instant::now(), handle).render_metrics();
        let ttft_lines: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with(TTFT_SECONDS))
            .collect();
        assert!(ttft_lines.iter().any(|l| l.contains("ttft-ok-engine")));
        assert!(!ttft_lines.iter().any(|l| l.contains("ttft-failed-engine")));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Error.as_str(), "error");
        assert_eq!(Outcome::Cancelled.as_str(), "cancelled");
    }
}
