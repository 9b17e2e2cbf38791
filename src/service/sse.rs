//! Server-sent event framing and mapping onto [`StreamEvent`].
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::events::{RunStatus, StreamEvent};
use crate::service::ServiceError;
use crate::service::types::{MessageDeltaChunk, RunStep, ThreadMessage, ThreadRun};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental SSE parser fed with raw body chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        let mut start = 0usize;
        for i in 0..self.buf.len() {
            if self.buf[i] == b'\n' {
                let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                start = i + 1;
                if let Some(frame) = self.feed_line(line.trim_end_matches('\r')) {
                    out.push(frame);
                }
            }
        }
        if start > 0 {
            self.buf.drain(0..start);
        }
        out
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            if let Some(frame) = self.feed_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => debug!(field, "ignoring sse field"),
        }
        None
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

fn parse<T: DeserializeOwned>(frame: &SseFrame) -> Result<T, ServiceError> {
    serde_json::from_str(&frame.data).map_err(|source| ServiceError::Decode {
        event: frame.event.clone(),
        source,
    })
}

fn raw_payload(data: &str) -> JsonValue {
    serde_json::from_str(data).unwrap_or_else(|_| JsonValue::String(data.to_string()))
}

/// Map one frame to zero or more events, preserving order.
pub fn decode_frame(frame: &SseFrame) -> Result<Vec<StreamEvent>, ServiceError> {
    let name = frame.event.as_str();
    let events = match name {
        "done" => vec![StreamEvent::Done],
        "error" => vec![StreamEvent::Error {
            data: frame.data.clone(),
        }],
        "thread.message.delta" => {
            let chunk: MessageDeltaChunk = parse(frame)?;
            chunk
                .delta
                .content
                .into_iter()
                .filter(|c| c.kind == "text")
                .filter_map(|c| c.text.and_then(|t| t.value))
                .map(|text| StreamEvent::TextDelta {
                    message_id: chunk.id.clone(),
                    text,
                })
                .collect()
        }
        "thread.message.created"
        | "thread.message.in_progress"
        | "thread.message.completed"
        | "thread.message.incomplete" => {
            let msg: ThreadMessage = parse(frame)?;
            let status = msg
                .status
                .unwrap_or_else(|| name.trim_start_matches("thread.message.").to_string());
            vec![StreamEvent::MessageCreated { id: msg.id, status }]
        }
        "thread.run.step.created"
        | "thread.run.step.in_progress"
        | "thread.run.step.completed"
        | "thread.run.step.failed"
        | "thread.run.step.cancelled"
        | "thread.run.step.expired" => {
            let step: RunStep = parse(frame)?;
            vec![StreamEvent::RunStepStatus {
                step_id: step.id,
                kind: step.kind,
                status: step.status,
            }]
        }
        "thread.run.created"
        | "thread.run.queued"
        | "thread.run.in_progress"
        | "thread.run.requires_action"
        | "thread.run.completed"
        | "thread.run.incomplete"
        | "thread.run.failed"
        | "thread.run.cancelling"
        | "thread.run.cancelled"
        | "thread.run.expired" => decode_run(parse(frame)?),
        _ => vec![StreamEvent::Unrecognized {
            kind: frame.event.clone(),
            data: raw_payload(&frame.data),
        }],
    };
    Ok(events)
}

fn decode_run(run: ThreadRun) -> Vec<StreamEvent> {
    let calls = match (&run.status, &run.required_action) {
        (RunStatus::RequiresAction, Some(action)) => action
            .submit_tool_outputs
            .as_ref()
            .map(|s| s.tool_calls.clone())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let mut events = vec![StreamEvent::RunStatus {
        run_id: run.id.clone(),
        status: run.status,
        last_error: run.last_error,
    }];
    for call in calls {
        // Every call must be answered or the run stalls; calls that are not
        // functions go out under their type name and fail as unknown tools.
        let (name, arguments) = match call.function {
            Some(f) if call.kind == "function" => (f.name, raw_payload(&f.arguments)),
            _ => {
                warn!(call_id = %call.id, kind = %call.kind, "tool call is not a function call");
                (call.kind, JsonValue::Object(Default::default()))
            }
        };
        events.push(StreamEvent::ToolCallRequest {
            run_id: run.id.clone(),
            call_id: call.id,
            name,
            arguments,
        });
    }
    events
}
