//! Benchmarks for engine selection latency.
//!
//! Routing runs on every request before any backend call, so a decision
//! should stay well under a millisecond even with a long fallback chain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gateway::config::{CircuitBreakerConfig, HealthCheckConfig, RoutingConfig};
use gateway::health::HealthMonitor;
use gateway::registry::{EngineRegistry, EngineSettings};
use gateway::routing::{EngineRouter, FixedPeakHours, RequestProfile};
use std::sync::Arc;

fn create_router(engine_count: usize, peak: bool) -> (EngineRouter, Arc<HealthMonitor>) {
    let registry = Arc::new(EngineRegistry::new());
    for i in 0..engine_count {
        let mut settings = EngineSettings::new(
            format!("engine-{}", i),
            format!("http://engine-{}:8080", i),
            format!("model-{}", i),
        );
        settings.supports_tools = i % 2 == 1;
        registry.add_engine(settings).unwrap();
    }

    let health = Arc::new(HealthMonitor::new(
        Arc::clone(&registry),
        HealthCheckConfig::default(),
        CircuitBreakerConfig::default(),
    ));
    let config = RoutingConfig {
        lightweight_engine: "engine-0".to_string(),
        high_capability_engine: format!("engine-{}", engine_count.saturating_sub(1)),
        ..Default::default()
    };
    let router = EngineRouter::new(registry, Arc::clone(&health), config)
        .with_peak_hours_policy(Arc::new(FixedPeakHours(peak)));
    (router, health)
}

/// Auto routing by rule: lightweight, tools, long context, peak hours.
fn bench_auto_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_routing");
    let (router, _) = create_router(2, false);
    let (peak_router, _) = create_router(2, true);

    group.bench_function("lightweight", |b| {
        let profile = RequestProfile::auto(400);
        b.iter(|| router.select_engine(black_box(&profile)))
    });
    group.bench_function("tools", |b| {
        let profile = RequestProfile::auto(400).with_tools();
        b.iter(|| router.select_engine(black_box(&profile)))
    });
    group.bench_function("long_context", |b| {
        let profile = RequestProfile::auto(40_000);
        b.iter(|| router.select_engine(black_box(&profile)))
    });
    group.bench_function("peak_hours", |b| {
        let profile = RequestProfile::auto(400);
        b.iter(|| peak_router.select_engine(black_box(&profile)))
    });

    group.finish();
}

/// Explicit preference for an unhealthy engine, forcing a walk of the
/// fallback chain whose length grows with the engine count.
fn bench_fallback_by_engine_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("explicit_fallback");

    for count in [2, 5, 10, 25] {
        let (router, health) = create_router(count, false);
        // Everything but the last engine is unhealthy
        for i in 0..count - 1 {
            for _ in 0..3 {
                health.record_failure(&format!("engine-{}", i), "connection refused");
            }
        }
        let profile = RequestProfile::explicit("engine-0");

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| router.select_engine(black_box(&profile)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_auto_rules, bench_fallback_by_engine_count);
criterion_main!(benches);
