//! End-to-end streaming tests: HTTP request in, mock engine behind, SSE out.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{HIGH, LIGHT};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn stream_events(app: axum::Router, request: Request<Body>) -> Vec<(String, Value)> {
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_to_string(response.into_body()).await;
    common::parse_sse(&body)
}

fn kinds(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(kind, _)| kind.as_str()).collect()
}

#[tokio::test]
async fn test_streaming_returns_event_stream_content_type() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;
    common::mount_chat_stream(&light, &["Hello"]).await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let response = app
        .oneshot(chat_request(&common::chat_body("Hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/event-stream"));
}

#[tokio::test]
async fn test_three_chunks_produce_meta_deltas_done() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;
    common::mount_chat_stream(&light, &["Hello", " ", "World"]).await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let events = stream_events(app, chat_request(&common::chat_body("Hi"))).await;

    assert_eq!(kinds(&events), vec!["meta", "delta", "delta", "delta", "done"]);
    assert_eq!(events[0].1["engine"], LIGHT);
    assert_eq!(events[0].1["model"], format!("{}-model", LIGHT));
    assert_eq!(events[1].1, json!({"kind": "text", "text": "Hello"}));
    assert_eq!(events[3].1["text"], "World");
    assert_eq!(events[4].1, json!({"finish_reason": "stop"}));
}

#[tokio::test]
async fn test_trace_id_from_header_reaches_meta() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;
    common::mount_chat_stream(&light, &["ok"]).await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let mut request = chat_request(&common::chat_body("Hi"));
    request
        .headers_mut()
        .insert("x-trace-id", "trace-abc".parse().unwrap());

    let events = stream_events(app, request).await;
    assert_eq!(events[0].1["trace_id"], "trace-abc");
}

#[tokio::test]
async fn test_generated_trace_id_is_uuid() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;
    common::mount_chat_stream(&light, &["ok"]).await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let events = stream_events(app, chat_request(&common::chat_body("Hi"))).await;

    let trace_id = events[0].1["trace_id"].as_str().unwrap();
    assert_eq!(trace_id.len(), common::UUID_V4_STRING_LEN);
}

#[tokio::test]
async fn test_backend_receives_engine_model_and_params() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": format!("{}-model", LIGHT),
            "stream": true,
            "max_tokens": 64,
            "stop": ["\n\n"]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(common::backend_sse_body(&["ok"])),
        )
        .expect(1)
        .mount(&light)
        .await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let body = json!({
        "messages": [{"role": "user", "content": "Hi"}],
        "max_tokens": 64,
        "stop": ["\n\n"]
    });
    let events = stream_events(app, chat_request(&body)).await;
    assert_eq!(kinds(&events).last(), Some(&"done"));
}

#[tokio::test]
async fn test_tools_route_to_high_capability_engine() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::backend_sse_body(&[])))
        .expect(0)
        .mount(&light)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"tools": [{"type": "function"}]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"lookup\",\"arguments\":\"{}\"}}]}}]}\n\ndata: [DONE]\n\n",
            ),
        )
        .expect(1)
        .mount(&high)
        .await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let body = json!({
        "messages": [{"role": "user", "content": "look it up"}],
        "tools": [{"type": "function", "function": {"name": "lookup", "parameters": {}}}]
    });
    let events = stream_events(app, chat_request(&body)).await;

    assert_eq!(events[0].1["engine"], HIGH);
    assert_eq!(events[1].1["kind"], "tool_call_delta");
    assert_eq!(events[1].1["name"], "lookup");
}

#[tokio::test]
async fn test_disabled_explicit_engine_falls_back() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;
    common::mount_chat_stream(&high, &["from high"]).await;

    let (app, state) = common::make_app_with_mocks(&light, &high);
    state
        .registry
        .update_engine(
            LIGHT,
            &gateway::registry::EngineUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

    let body = json!({
        "engine": LIGHT,
        "messages": [{"role": "user", "content": "Hi"}]
    });
    let events = stream_events(app, chat_request(&body)).await;
    assert_eq!(events[0].1["engine"], HIGH);
    assert_eq!(events[1].1["text"], "from high");
}

#[tokio::test]
async fn test_no_usable_engine_single_error_event() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    let (app, state) = common::make_app_with_mocks(&light, &high);
    for name in [LIGHT, HIGH] {
        for _ in 0..3 {
            state.health().record_failure(name, "connection refused");
        }
    }

    let events = stream_events(app, chat_request(&common::chat_body("Hi"))).await;
    assert_eq!(kinds(&events), vec!["error"]);
    assert_eq!(events[0].1["kind"], "engine_unavailable");
}

#[tokio::test]
async fn test_backend_status_error_becomes_stream_error() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&light)
        .await;

    let (app, state) = common::make_app_with_mocks(&light, &high);
    let events = stream_events(app, chat_request(&common::chat_body("Hi"))).await;

    assert_eq!(kinds(&events), vec!["meta", "error"]);
    assert_eq!(events[1].1["kind"], "stream_error");
    assert!(events[1].1["message"]
        .as_str()
        .unwrap()
        .contains("model crashed"));
    assert_eq!(state.health().snapshot(LIGHT).consecutive_failures, 1);
    assert_eq!(state.admission().in_flight(LIGHT), 0);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(common::backend_sse_body(&["late"]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&light)
        .await;

    let mut config = common::two_engine_config(&light.uri(), &high.uri());
    config.server.request_timeout_seconds = 1;
    let (app, state) = common::make_app(config);

    let events = stream_events(app, chat_request(&common::chat_body("Hi"))).await;
    assert_eq!(kinds(&events), vec!["meta", "error"]);
    assert_eq!(events[1].1["kind"], "timeout");
    assert_eq!(state.admission().in_flight(LIGHT), 0);
}

#[tokio::test]
async fn test_empty_messages_rejected() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let response = app
        .oneshot(chat_request(&json!({"messages": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value =
        serde_json::from_str(&common::body_to_string(response.into_body()).await).unwrap();
    assert_eq!(body["error"]["code"], "invalid_request_error");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let light = MockServer::start().await;
    let high = MockServer::start().await;

    let (app, _) = common::make_app_with_mocks(&light, &high);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
