//! Streaming chat endpoint.

use super::{ApiError, AppState};
use crate::gateway::{GatewayEvent, GatewayRequest, RequestContext};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// POST /v1/chat/stream - Stream gateway events for one chat request.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<GatewayRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(mut request) = payload.map_err(|e| ApiError::bad_request(&e.body_text()))?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages cannot be empty"));
    }

    let context = resolve_identity(&headers, request.trace_id.as_deref());
    request.trace_id = Some(context.trace_id.clone());
    tracing::info!(
        trace_id = %context.trace_id,
        caller_id = %context.caller_id,
        engine = ?request.engine,
        messages = request.messages.len(),
        "Chat stream request"
    );

    let events = state
        .gateway
        .stream_chat(request, context)
        .map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Caller id from the header, trace id from the body, then the header, then a new UUID.
pub fn resolve_identity(headers: &HeaderMap, body_trace_id: Option<&str>) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let trace_id = body_trace_id
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| header(TRACE_ID_HEADER))
        .unwrap_or_else(crate::logging::generate_trace_id);
    let caller_id = header(CALLER_ID_HEADER).unwrap_or_else(|| ANONYMOUS_CALLER.to_string());

    RequestContext {
        trace_id,
        caller_id,
    }
}

fn to_sse(event: &GatewayEvent) -> Event {
    let data = match event.data() {
        Ok(value) => value.to_string(),
        Err(e) => {
            tracing::error!(error = %e, kind = event.kind(), "Failed to serialize event");
            "{}".to_string()
        }
    };
    Event::default().event(event.kind()).data(data)
}
