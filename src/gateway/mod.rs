//! Gateway orchestration
//!
//! [`Gateway::stream_chat`] turns one chat request into one event stream:
//! route, admit, announce with `meta`, stream the backend through a
//! [`ChunkTransformer`], and end with exactly one terminal event. The
//! admission permit lives inside the stream, so it is released on every exit
//! path, including the caller dropping the stream.

pub mod client;
pub mod events;
pub mod transform;


pub use client::{
    BackendChatRequest, BackendError, ByteStream, ChatMessage, EngineClient, HttpEngineClient,
};
pub use events::{DeltaEvent, DoneEvent, ErrorEvent, GatewayErrorKind, GatewayEvent, MetaEvent};
pub use transform::{ChunkParseError, ChunkTransformer};

use crate::admission::AdmissionController;
use crate::health::HealthMonitor;
use crate::metrics::{record_error, RequestRecorder, NO_ENGINE};
use crate::registry::EngineSettings;
use crate::routing::{EnginePreference, EngineRouter, RequestProfile, RoutingDecision};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered events for one request
pub type EventStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

/// Inbound chat request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// `auto`, `ab`, or an engine name
    #[serde(default)]
    pub engine: EnginePreference,
    /// Primary engine of an A/B comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ab_primary: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    /// JSON schema the response must follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl GatewayRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn profile(&self) -> RequestProfile {
        RequestProfile {
            preference: self.engine.clone(),
            needs_tools: self.tools.as_ref().is_some_and(|t| !t.is_empty()),
            needs_structured_output: self.response_schema.is_some(),
            content_chars: self.messages.iter().map(ChatMessage::content_chars).sum(),
        }
    }

    /// Backend request for the chosen engine.
    pub fn to_backend(&self, engine: &EngineSettings) -> BackendChatRequest {
        let tools = self.tools.clone().filter(|t| !t.is_empty());
        BackendChatRequest {
            model: engine.model.clone(),
            messages: self.messages.clone(),
            stream: true,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            stop: self.stop.clone(),
            tools,
            response_format: self.response_schema.as_ref().map(|schema| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {"name": "response", "schema": schema},
                })
            }),
        }
    }
}

/// Identity of the request for logs, metrics and admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub trace_id: String,
    pub caller_id: String,
}

/// Runs A/B comparisons. The returned stream is forwarded unchanged.
pub trait ExperimentDispatcher: Send + Sync {
    fn dispatch(&self, request: GatewayRequest, context: RequestContext) -> EventStream;
}

/// Orchestrates routing, admission and streaming for chat requests.
pub struct Gateway {
    router: Arc<EngineRouter>,
    health: Arc<HealthMonitor>,
    admission: Arc<AdmissionController>,
    client: Arc<dyn EngineClient>,
    request_timeout: Duration,
    experiments: Option<Arc<dyn ExperimentDispatcher>>,
}

impl Gateway {
    pub fn new(
        router: Arc<EngineRouter>,
        health: Arc<HealthMonitor>,
        admission: Arc<AdmissionController>,
        client: Arc<dyn EngineClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            router,
            health,
            admission,
            client,
            request_timeout,
            experiments: None,
        }
    }

    pub fn with_experiment_dispatcher(mut self, dispatcher: Arc<dyn ExperimentDispatcher>) -> Self {
        self.experiments = Some(dispatcher);
        self
    }

    pub fn router(&self) -> &Arc<EngineRouter> {
        &self.router
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// Stream a chat completion as gateway events.
    pub fn stream_chat(self: &Arc<Self>, request: GatewayRequest, context: RequestContext) -> EventStream {
        if request.engine == EnginePreference::Ab {
            if let Some(dispatcher) = &self.experiments {
                tracing::info!(trace_id = %context.trace_id, "Delegating to experiment dispatcher");
                return dispatcher.dispatch(request, context);
            }
        }

        let gateway = Arc::clone(self);
        Box::pin(async_stream::stream! {
            let started = Instant::now();
            let started_at = chrono::Utc::now();
            let RequestContext { trace_id, caller_id } = context;

            let decision = match gateway.route(&request) {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(trace_id = %trace_id, error = %e, "Routing failed");
                    record_error(NO_ENGINE, GatewayErrorKind::EngineUnavailable.as_str());
                    yield GatewayEvent::error(GatewayErrorKind::EngineUnavailable, e.to_string());
                    return;
                }
            };
            let engine = Arc::clone(&decision.engine);

            let permit = match gateway.admission.acquire(&engine.name, &caller_id).await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::warn!(
                        trace_id = %trace_id,
                        engine = %engine.name,
                        caller_id = %caller_id,
                        error = %e,
                        "Admission denied"
                    );
                    record_error(&engine.name, GatewayErrorKind::RateLimited.as_str());
                    yield GatewayEvent::error(GatewayErrorKind::RateLimited, e.to_string());
                    return;
                }
            };

            let mut recorder = RequestRecorder::new(engine.name.clone(), started);
            let backend_request = request.to_backend(&engine);
            tracing::info!(
                trace_id = %trace_id,
                engine = %engine.name,
                model = %engine.model,
                reason = %decision.reason,
                caller_id = %caller_id,
                "Starting chat stream"
            );
            yield GatewayEvent::Meta(MetaEvent {
                trace_id: trace_id.clone(),
                engine: engine.name.clone(),
                model: engine.model.clone(),
                started_at,
            });

            let deadline = tokio::time::Instant::now() + gateway.request_timeout;
            let call_started = Instant::now();
            let opened = tokio::time::timeout_at(
                deadline,
                gateway.client.stream_chat(&engine, &backend_request),
            )
            .await;
            let mut body = match opened {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    recorder.failed();
                    yield gateway.stream_failure(&engine.name, &trace_id, &e.to_string());
                    return;
                }
                Err(_) => {
                    recorder.failed();
                    yield gateway.deadline_exceeded(&engine.name, &trace_id);
                    return;
                }
            };

            let mut transformer = ChunkTransformer::new();
            let mut first_chunk = true;
            loop {
                match tokio::time::timeout_at(deadline, body.next()).await {
                    Ok(Some(Ok(bytes))) => {
                        if first_chunk {
                            first_chunk = false;
                            gateway.health.record_success(&engine.name, call_started.elapsed());
                            recorder.first_token();
                        }
                        for event in transformer.push_bytes(&bytes) {
                            yield event;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        recorder.failed();
                        yield gateway.stream_failure(&engine.name, &trace_id, &e.to_string());
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        recorder.failed();
                        yield gateway.deadline_exceeded(&engine.name, &trace_id);
                        return;
                    }
                }
            }

            for event in transformer.finish() {
                yield event;
            }
            recorder.succeeded();
            permit.release();
            tracing::info!(
                trace_id = %trace_id,
                engine = %engine.name,
                skipped_chunks = transformer.skipped_chunks(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Chat stream completed"
            );
        })
    }

    fn route(&self, request: &GatewayRequest) -> Result<RoutingDecision, crate::routing::RoutingError> {
        match request.engine {
            EnginePreference::Ab => {
                let primary = request
                    .ab_primary
                    .as_deref()
                    .unwrap_or(&self.router.config().lightweight_engine);
                self.router.select_primary(primary)
            }
            _ => self.router.select_engine(&request.profile()),
        }
    }

    fn stream_failure(&self, engine: &str, trace_id: &str, message: &str) -> GatewayEvent {
        let kind = GatewayErrorKind::from_upstream_message(message);
        tracing::warn!(trace_id, engine, error = message, kind = %kind, "Backend stream failed");
        self.health.record_failure(engine, message);
        record_error(engine, kind.as_str());
        GatewayEvent::error(kind, message)
    }

    fn deadline_exceeded(&self, engine: &str, trace_id: &str) -> GatewayEvent {
        let message = format!(
            "backend timeout after {}s",
            self.request_timeout.as_secs_f64()
        );
        tracing::warn!(trace_id, engine, "Request deadline exceeded");
        self.health.record_failure(engine, &message);
        record_error(engine, GatewayErrorKind::Timeout.as_str());
        GatewayEvent::error(GatewayErrorKind::Timeout, message)
    }
}
