//! Shared test utilities for gateway integration tests.
//!
//! Provides builders for engine configs and apps backed by wiremock engines,
//! plus helpers to read and parse server-sent event bodies.

#![allow(dead_code)]

use axum::body::Body;
use gateway::api::{create_router, AppState};
use gateway::config::{EngineConfig, GatewayConfig};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// UUID v4 string length: "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
pub const UUID_V4_STRING_LEN: usize = 36;

pub const LIGHT: &str = "fast-local";
pub const HIGH: &str = "batched-gpu";

// =============================================================================
// Config Builders
// =============================================================================

/// Engine definition pointing at `url` with default limits.
pub fn engine_config(name: &str, url: &str) -> EngineConfig {
    EngineConfig {
        name: name.to_string(),
        url: url.to_string(),
        model: format!("{}-model", name),
        enabled: true,
        supports_tools: false,
        supports_structured_output: false,
        max_concurrent: 4,
        chars_per_token: 4,
    }
}

/// Lightweight and high-capability engines, peak hours off so routing is
/// independent of the wall clock.
pub fn two_engine_config(light_url: &str, high_url: &str) -> GatewayConfig {
    let mut high = engine_config(HIGH, high_url);
    high.supports_tools = true;
    high.supports_structured_output = true;

    let mut config = GatewayConfig {
        engines: vec![engine_config(LIGHT, light_url), high],
        ..Default::default()
    };
    config.routing.lightweight_engine = LIGHT.to_string();
    config.routing.high_capability_engine = HIGH.to_string();
    config.routing.fallback_order = vec![LIGHT.to_string(), HIGH.to_string()];
    config.routing.peak_hours.enabled = false;
    config.health_check.enabled = false;
    config
}

// =============================================================================
// App Builders
// =============================================================================

/// Build the full component graph and HTTP router from `config`.
pub fn make_app(config: GatewayConfig) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::from_config(Arc::new(config)).unwrap());
    (create_router(Arc::clone(&state)), state)
}

/// Two engines served by two mock servers.
pub fn make_app_with_mocks(
    light: &wiremock::MockServer,
    high: &wiremock::MockServer,
) -> (axum::Router, Arc<AppState>) {
    make_app(two_engine_config(&light.uri(), &high.uri()))
}

// =============================================================================
// Backend Stream Builders
// =============================================================================

/// Backend streaming body with one content chunk per entry, ending in `[DONE]`.
pub fn backend_sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for (i, content) in chunks.iter().enumerate() {
        let chunk = serde_json::json!({
            "id": format!("chatcmpl-{}", i),
            "object": "chat.completion.chunk",
            "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str(
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

/// Mount a streaming chat response on `server`.
pub async fn mount_chat_stream(server: &wiremock::MockServer, chunks: &[&str]) {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(backend_sse_body(chunks))
                .insert_header("content-type", "text/event-stream"),
        )
        .mount(server)
        .await;
}

// =============================================================================
// Body Helpers
// =============================================================================

/// Read a whole response body as a string.
pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

/// Parse an SSE body into `(event, data)` pairs, skipping comments.
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(kind) = line.strip_prefix("event:") {
                    event = Some(kind.trim().to_string());
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data = serde_json::from_str(payload.trim()).ok();
                }
            }
            Some((event?, data?))
        })
        .collect()
}

/// JSON body for a chat request with one user message.
pub fn chat_body(content: &str) -> Value {
    serde_json::json!({
        "messages": [{"role": "user", "content": content}]
    })
}
