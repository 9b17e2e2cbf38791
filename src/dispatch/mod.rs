//! Sequential event dispatch for one run.
//!
//! The dispatcher pulls one event, handles it to completion (including any tool
//! invocation and the submission of its result) and only then pulls the next.
mod error;
mod handler;

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{RunError, StreamEvent, ToolOutcome};
use crate::service::{EventSource, ServiceError};
use crate::tools::ToolRegistry;

pub use error::DispatchError;
pub use handler::{ConsoleHandler, EventHandler};

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Streaming,
    AwaitingToolResult,
    Terminated(Termination),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub state: DispatchState,
    /// Concatenated text deltas.
    pub text: String,
    /// Tool calls in the order they were executed.
    pub tool_calls: Vec<ToolCallRecord>,
}

pub struct Dispatcher<H: EventHandler> {
    registry: Arc<ToolRegistry>,
    handler: H,
    state: DispatchState,
    tool_timeout: Duration,
    outcome: RunOutcome,
    failure: Option<(String, Option<RunError>)>,
}

impl<H: EventHandler> Dispatcher<H> {
    pub fn new(registry: Arc<ToolRegistry>, handler: H) -> Self {
        Self {
            registry,
            handler,
            state: DispatchState::Streaming,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            outcome: RunOutcome::default(),
            failure: None,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    #[cfg(test)]
    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    #[cfg(test)]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Handle a single event. Tool results are submitted to `source` before returning.
    ///
    /// `cancel` is honoured while a tool runs and while its result is submitted;
    /// a cancelled call is never submitted.
    pub async fn handle(
        &mut self,
        event: StreamEvent,
        source: &mut dyn EventSource,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        if let DispatchState::Terminated(_) = self.state {
            error!(state = ?self.state, event = %event.kind(), "event received after run terminated");
            return Err(DispatchError::ProtocolViolation {
                state: self.state,
                event: event.kind().to_string(),
            });
        }
        debug!(event = %event.kind(), "dispatching event");

        match event {
            StreamEvent::TextDelta { message_id, text } => {
                self.outcome.text.push_str(&text);
                self.handler.on_text_delta(&message_id, &text);
            }
            StreamEvent::MessageCreated { id, status } => {
                self.handler.on_message(&id, &status);
            }
            StreamEvent::RunStatus {
                run_id,
                status,
                last_error,
            } => {
                self.handler
                    .on_run_status(&run_id, &status, last_error.as_ref());
                if status.is_failure() {
                    warn!(run_id = %run_id, status = %status, "run ended without success");
                    self.state = DispatchState::Terminated(Termination::Failure);
                    self.failure = Some((run_id, last_error));
                }
            }
            StreamEvent::RunStepStatus {
                step_id,
                kind,
                status,
            } => {
                self.handler.on_run_step(&step_id, &kind, &status);
            }
            StreamEvent::ToolCallRequest {
                run_id,
                call_id,
                name,
                arguments,
            } => {
                self.state = DispatchState::AwaitingToolResult;
                info!(run_id = %run_id, call_id = %call_id, tool = %name, "tool call requested");
                let invoked = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    outcome = self.invoke_tool(&name, arguments) => Some(outcome),
                };
                let Some(outcome) = invoked else {
                    warn!(call_id = %call_id, tool = %name, "run abandoned while tool was running");
                    return Err(DispatchError::Cancelled);
                };
                self.handler.on_tool_result(&call_id, &name, &outcome);
                let submitted = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    res = source.submit_tool_result(&call_id, &outcome) => Some(res),
                };
                match submitted {
                    Some(res) => res?,
                    None => {
                        warn!(call_id = %call_id, "run abandoned before tool result was submitted");
                        return Err(DispatchError::Cancelled);
                    }
                }
                self.outcome.tool_calls.push(ToolCallRecord {
                    call_id,
                    name,
                    outcome,
                });
                self.state = DispatchState::Streaming;
            }
            StreamEvent::Error { data } => {
                warn!(data = %data, "agent service reported an error event");
                self.handler.on_error(&data);
            }
            StreamEvent::Done => {
                self.state = DispatchState::Terminated(Termination::Success);
                self.handler.on_done();
            }
            StreamEvent::Unrecognized { kind, data } => {
                self.handler.on_unhandled(&kind, &data);
            }
        }
        Ok(())
    }

    /// Run the tool on the blocking pool so slow tools do not stall the runtime.
    async fn invoke_tool(&self, name: &str, arguments: JsonValue) -> ToolOutcome {
        let registry = Arc::clone(&self.registry);
        let tool = name.to_string();
        let task = tokio::task::spawn_blocking(move || registry.invoke(&tool, &arguments));
        match tokio::time::timeout(self.tool_timeout, task).await {
            Ok(Ok(Ok(value))) => ToolOutcome::Success(value),
            Ok(Ok(Err(e))) => {
                warn!(tool = %name, err = %e, "tool invocation failed");
                ToolOutcome::Failure(e.to_string())
            }
            Ok(Err(join_err)) => {
                error!(tool = %name, err = %join_err, "tool task aborted");
                ToolOutcome::Failure(format!("tool {name} aborted: {join_err}"))
            }
            Err(_) => {
                warn!(tool = %name, timeout_ms = %self.tool_timeout.as_millis(), "tool timed out");
                ToolOutcome::Failure(format!(
                    "tool {name} timed out after {}ms",
                    self.tool_timeout.as_millis()
                ))
            }
        }
    }

    /// Drive `source` until the run terminates.
    pub async fn run(
        &mut self,
        source: &mut dyn EventSource,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, DispatchError> {
        while !matches!(self.state, DispatchState::Terminated(_)) {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("run abandoned; remote agent and thread are left in place");
                    return Err(DispatchError::Cancelled);
                }
                next = source.next_event() => next,
            };
            match next {
                Some(Ok(event)) => self.handle(event, source, &cancel).await?,
                Some(Err(e)) => {
                    error!(err = %e, "event stream error");
                    return Err(DispatchError::Connection(e));
                }
                None => return Err(DispatchError::Connection(ServiceError::StreamClosed)),
            }
        }

        match self.state {
            DispatchState::Terminated(Termination::Failure) => {
                let (run_id, error) = self.failure.clone().unwrap_or_default();
                Err(DispatchError::RunFailed { run_id, error })
            }
            _ => {
                info!(
                    tool_calls = self.outcome.tool_calls.len(),
                    text_len = self.outcome.text.len(),
                    "run completed"
                );
                self.outcome.state = self.state;
                Ok(self.outcome.clone())
            }
        }
    }
}
