use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, info};

use crate::events::{StreamEvent, ToolOutcome};
use crate::service::types::ToolOutput;
use crate::service::{AgentsClient, EventSource, ServiceError};

/// Decoded events of one HTTP response, grouped per SSE frame.
pub(crate) type EventSegment =
    Pin<Box<dyn Stream<Item = Result<Vec<StreamEvent>, ServiceError>> + Send>>;

/// Event sequence of one run over HTTP.
///
/// A `requires_action` status ends the current response. Outputs for the batch of
/// tool calls are collected and, once the last one arrives, posted together; the
/// continuation response then replaces the exhausted one, so the consumer sees a
/// single sequence ending in one terminal event.
pub struct RunStream {
    client: AgentsClient,
    thread_id: String,
    segment: Option<EventSegment>,
    queued: VecDeque<StreamEvent>,
    run_id: Option<String>,
    pending: Vec<String>,
    outputs: Vec<ToolOutput>,
    finished: bool,
}

impl RunStream {
    pub(crate) fn new(client: AgentsClient, thread_id: String, segment: EventSegment) -> Self {
        Self {
            client,
            thread_id,
            segment: Some(segment),
            queued: VecDeque::new(),
            run_id: None,
            pending: Vec::new(),
            outputs: Vec::new(),
            finished: false,
        }
    }

    fn enqueue(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            if let StreamEvent::ToolCallRequest {
                run_id, call_id, ..
            } = &event
            {
                self.run_id = Some(run_id.clone());
                self.pending.push(call_id.clone());
            }
            self.queued.push_back(event);
        }
    }
}

#[async_trait]
impl EventSource for RunStream {
    async fn next_event(&mut self) -> Option<Result<StreamEvent, ServiceError>> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(event) = self.queued.pop_front() {
                match &event {
                    StreamEvent::Done => self.finished = true,
                    StreamEvent::RunStatus { status, .. } if status.is_failure() => {
                        self.finished = true;
                    }
                    _ => {}
                }
                return Some(Ok(event));
            }
            let segment = self.segment.as_mut()?;
            match segment.next().await {
                Some(Ok(events)) => self.enqueue(events),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    debug!("run stream segment ended");
                    self.segment = None;
                    return None;
                }
            }
        }
    }

    async fn submit_tool_result(
        &mut self,
        call_id: &str,
        outcome: &ToolOutcome,
    ) -> Result<(), ServiceError> {
        let pos = self
            .pending
            .iter()
            .position(|c| c == call_id)
            .ok_or_else(|| ServiceError::UnexpectedToolOutput(call_id.to_string()))?;
        self.pending.remove(pos);
        self.outputs.push(ToolOutput {
            tool_call_id: call_id.to_string(),
            output: outcome.to_output_string(),
        });
        if !self.pending.is_empty() {
            return Ok(());
        }

        let run_id = self
            .run_id
            .take()
            .ok_or_else(|| ServiceError::UnexpectedToolOutput(call_id.to_string()))?;
        let outputs = std::mem::take(&mut self.outputs);
        info!(run_id = %run_id, count = outputs.len(), "submitting tool outputs");
        let segment = self
            .client
            .submit_tool_outputs_stream(&self.thread_id, &run_id, outputs)
            .await?;
        // The previous response only has its trailing `done` left.
        self.segment = Some(segment);
        Ok(())
    }
}
