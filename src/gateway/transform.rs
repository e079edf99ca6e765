//! Backend stream to gateway events
//!
//! One [`ChunkTransformer`] per request. It re-frames raw bytes into lines,
//! turns each `data:` line into zero or more delta events, and appends the
//! single `done` when the backend stream ends.

use super::events::{DeltaEvent, DoneEvent, GatewayEvent};
use bytes::{Buf, BytesMut};
use serde::Deserialize;
use thiserror::Error;

/// Backend end-of-stream sentinel
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest backend line kept in memory; longer lines are dropped as malformed.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ChunkParseError {
    #[error("malformed chunk: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendChunk {
    #[serde(default)]
    pub choices: Vec<BackendChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendChoice {
    #[serde(default)]
    pub delta: BackendDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<BackendToolCall>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<BackendFunction>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Parse one `data:` payload.
pub fn parse_chunk(data: &str) -> Result<BackendChunk, ChunkParseError> {
    Ok(serde_json::from_str(data)?)
}

/// Per-request stream transformer
#[derive(Debug)]
pub struct ChunkTransformer {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
    max_line_bytes: usize,
    /// Inside an oversized line; bytes are dropped until the next newline
    discarding: bool,
    finish_reason: Option<String>,
    skipped_chunks: usize,
    finished: bool,
}

impl Default for ChunkTransformer {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl ChunkTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_line_bytes,
            discarding: false,
            finish_reason: None,
            skipped_chunks: 0,
            finished: false,
        }
    }

    /// Feed raw bytes; returns events for every complete line.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<GatewayEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n')
            else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_line_bytes {
                    self.drop_oversized_line();
                }
                break;
            };

            let line = self.buffer.split_to(self.scanned + offset);
            self.buffer.advance(1);
            self.scanned = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            events.extend(self.transform_line(&String::from_utf8_lossy(&line)));
        }
        events
    }

    fn drop_oversized_line(&mut self) {
        if !self.discarding {
            self.discarding = true;
            self.skipped_chunks += 1;
            tracing::warn!(
                max_line_bytes = self.max_line_bytes,
                "Dropping oversized backend line"
            );
        }
        self.buffer.clear();
        self.scanned = 0;
    }

    /// End of the backend stream: flush a trailing partial line and append `done`.
    ///
    /// Returns nothing if called more than once.
    pub fn finish(&mut self) -> Vec<GatewayEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        if !self.buffer.is_empty() && !self.discarding {
            let rest = self.buffer.split();
            events.extend(self.transform_line(&String::from_utf8_lossy(&rest)));
        }
        events.push(GatewayEvent::Done(DoneEvent {
            finish_reason: self.finish_reason.take(),
        }));
        events
    }

    /// Chunks dropped because they could not be parsed.
    pub fn skipped_chunks(&self) -> usize {
        self.skipped_chunks
    }

    /// Transform one line of the backend stream.
    pub fn transform_line(&mut self, line: &str) -> Vec<GatewayEvent> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Vec::new();
        };
        let data = data.trim();
        if data.is_empty() || data == DONE_SENTINEL {
            return Vec::new();
        }

        match parse_chunk(data) {
            Ok(chunk) => self.chunk_events(chunk),
            Err(e) => {
                self.skipped_chunks += 1;
                tracing::warn!(error = %e, chunk = %truncate(data, 200), "Skipping malformed chunk");
                Vec::new()
            }
        }
    }

    fn chunk_events(&mut self, chunk: BackendChunk) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(GatewayEvent::text(text));
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                events.push(GatewayEvent::Delta(DeltaEvent::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }));
            }
            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }
        events
    }
}

/// Transform a complete sequence of backend lines.
pub fn transform_lines<'a, I>(lines: I) -> Vec<GatewayEvent>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut transformer = ChunkTransformer::new();
    let mut events: Vec<_> = lines
        .into_iter()
        .flat_map(|line| transformer.transform_line(line))
        .collect();
    events.extend(transformer.finish());
    events
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
