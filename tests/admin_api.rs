//! Admin and liveness endpoint tests against the full router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{HIGH, LIGHT};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> (axum::Router, std::sync::Arc<gateway::api::AppState>) {
    common::make_app(common::two_engine_config(
        "http://127.0.0.1:1",
        "http://127.0.0.1:2",
    ))
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = common::body_to_string(response.into_body()).await;
    let json = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_list_engines_includes_health() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/admin/engines", None).await;

    assert_eq!(status, StatusCode::OK);
    let engines = body.as_array().unwrap();
    assert_eq!(engines.len(), 2);
    assert_eq!(engines[0]["name"], HIGH);
    assert_eq!(engines[1]["name"], LIGHT);
    assert_eq!(engines[1]["health"]["status"], "UNKNOWN");
    assert_eq!(engines[1]["circuit"]["state"], "CLOSED");
    assert_eq!(engines[1]["in_flight"], 0);
    assert_eq!(engines[1]["usable"], true);
}

#[tokio::test]
async fn test_patch_disables_engine() {
    let (app, state) = test_app();
    let before = state.registry.get(LIGHT).unwrap().updated_at;

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/admin/engines/{}", LIGHT),
        Some(json!({"enabled": false})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
    assert_eq!(body["usable"], false);
    assert!(state.registry.get(LIGHT).unwrap().updated_at >= before);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["engines"]["total"], 2);
    assert_eq!(health["engines"]["usable"], 1);
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_patch_max_concurrent_resizes_admission() {
    let (app, state) = test_app();
    assert_eq!(state.admission().capacity(HIGH), Some(4));

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/admin/engines/{}", HIGH),
        Some(json!({"max_concurrent": 8, "model": "qwen2.5-72b"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_concurrent"], 8);
    assert_eq!(body["model"], "qwen2.5-72b");
    assert_eq!(state.admission().capacity(HIGH), Some(8));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_patches_leave_capacity_matching_registry() {
    let (app, state) = test_app();

    let tasks: Vec<_> = (1..=16u32)
        .map(|capacity| {
            let app = app.clone();
            tokio::spawn(async move {
                send(
                    &app,
                    "PATCH",
                    &format!("/admin/engines/{}", HIGH),
                    Some(json!({"max_concurrent": capacity})),
                )
                .await
            })
        })
        .collect();
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let committed = state.registry.get(HIGH).unwrap().max_concurrent;
    assert_eq!(state.admission().capacity(HIGH), Some(committed));
}

#[tokio::test]
async fn test_patch_unknown_engine_404() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "PATCH",
        "/admin/engines/gguf",
        Some(json!({"enabled": false})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "engine_not_found");
}

#[tokio::test]
async fn test_patch_invalid_update_400() {
    let (app, state) = test_app();
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/admin/engines/{}", LIGHT),
        Some(json!({"max_concurrent": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.registry.get(LIGHT).unwrap().max_concurrent, 4);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/admin/engines/{}", LIGHT),
        Some(json!({"priority": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_engine_health_and_reset() {
    let (app, state) = test_app();
    for _ in 0..3 {
        state.health().record_failure(LIGHT, "connection refused");
    }

    let uri = format!("/admin/engines/{}/health", LIGHT);
    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], LIGHT);
    assert_eq!(body["health"]["status"], "UNHEALTHY");
    assert_eq!(body["health"]["consecutive_failures"], 3);
    assert_eq!(body["health"]["last_error"], "connection refused");
    assert_eq!(body["circuit"]["buffered_calls"], 3);

    let (status, body) = send(&app, "POST", &format!("{}/reset", uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"]["status"], "UNKNOWN");
    assert_eq!(body["health"]["consecutive_failures"], 0);
    assert_eq!(body["circuit"]["state"], "CLOSED");
    assert_eq!(body["circuit"]["buffered_calls"], 0);
    assert!(state.router().is_usable(LIGHT));
}

#[tokio::test]
async fn test_engine_health_unknown_404() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/admin/engines/gguf/health", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/admin/engines/gguf/health/reset", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_liveness_degraded_without_usable_engines() {
    let (app, _) = test_app();
    for name in [LIGHT, HIGH] {
        send(
            &app,
            "PATCH",
            &format!("/admin/engines/{}", name),
            Some(json!({"enabled": false})),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["engines"]["usable"], 0);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_metrics_endpoint_prometheus_text() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}
