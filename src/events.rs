use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Status of a run as reported by the agent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
    #[serde(untagged)]
    Other(String),
}

impl RunStatus {
    /// Statuses after which the service will not continue the run.
    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// One unit of the ordered notification sequence produced during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta {
        message_id: String,
        text: String,
    },
    MessageCreated {
        id: String,
        status: String,
    },
    RunStatus {
        run_id: String,
        status: RunStatus,
        last_error: Option<RunError>,
    },
    RunStepStatus {
        step_id: String,
        kind: String,
        status: String,
    },
    ToolCallRequest {
        run_id: String,
        call_id: String,
        name: String,
        arguments: JsonValue,
    },
    Error {
        data: String,
    },
    Done,
    Unrecognized {
        kind: String,
        data: JsonValue,
    },
}

impl StreamEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::TextDelta { .. } => "text_delta",
            StreamEvent::MessageCreated { .. } => "message_created",
            StreamEvent::RunStatus { .. } => "run_status",
            StreamEvent::RunStepStatus { .. } => "run_step_status",
            StreamEvent::ToolCallRequest { .. } => "tool_call_request",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
            StreamEvent::Unrecognized { kind, .. } => kind,
        }
    }
}

/// Result of a local tool invocation as reported back to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(JsonValue),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Text submitted as the tool output. Plain strings are passed through unquoted.
    pub fn to_output_string(&self) -> String {
        match self {
            ToolOutcome::Success(JsonValue::String(s)) => s.clone(),
            ToolOutcome::Success(v) => v.to_string(),
            ToolOutcome::Failure(msg) => serde_json::json!({ "error": msg }).to_string(),
        }
    }
}
