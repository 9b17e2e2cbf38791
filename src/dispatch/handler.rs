use serde_json::Value as JsonValue;
use std::io::{self, Write};

use crate::events::{RunError, RunStatus, ToolOutcome};

/// Side effects per event kind. Every method defaults to a no-op.
pub trait EventHandler: Send {
    fn on_text_delta(&mut self, _message_id: &str, _text: &str) {}

    fn on_message(&mut self, _id: &str, _status: &str) {}

    fn on_run_status(&mut self, _run_id: &str, _status: &RunStatus, _last_error: Option<&RunError>) {}

    fn on_run_step(&mut self, _step_id: &str, _kind: &str, _status: &str) {}

    fn on_tool_result(&mut self, _call_id: &str, _name: &str, _outcome: &ToolOutcome) {}

    fn on_error(&mut self, _data: &str) {}

    fn on_done(&mut self) {}

    fn on_unhandled(&mut self, _kind: &str, _data: &JsonValue) {}
}

/// Prints every event as a line of text.
pub struct ConsoleHandler<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsoleHandler {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, s: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(s);
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> EventHandler for ConsoleHandler<W> {
    fn on_text_delta(&mut self, _message_id: &str, text: &str) {
        self.line(format_args!("Text delta received: {text}"));
    }

    fn on_message(&mut self, id: &str, status: &str) {
        self.line(format_args!("ThreadMessage created. ID: {id}, Status: {status}"));
    }

    fn on_run_status(&mut self, _run_id: &str, status: &RunStatus, last_error: Option<&RunError>) {
        self.line(format_args!("ThreadRun status: {status}"));
        if status.is_failure() {
            match last_error {
                Some(e) => self.line(format_args!("Run failed. Error: {e}")),
                None => self.line(format_args!("Run failed. Error: none reported")),
            }
        }
    }

    fn on_run_step(&mut self, _step_id: &str, kind: &str, status: &str) {
        self.line(format_args!("RunStep type: {kind}, Status: {status}"));
    }

    fn on_tool_result(&mut self, call_id: &str, name: &str, outcome: &ToolOutcome) {
        let verdict = if outcome.is_success() { "OK" } else { "ERR" };
        self.line(format_args!(
            "[tool] {name} ({call_id}) => {verdict} {}",
            outcome.to_output_string()
        ));
    }

    fn on_error(&mut self, data: &str) {
        self.line(format_args!("An error occurred. Data: {data}"));
    }

    fn on_done(&mut self) {
        self.line(format_args!("Stream completed."));
    }

    fn on_unhandled(&mut self, kind: &str, data: &JsonValue) {
        self.line(format_args!("Unhandled Event Type: {kind}, Data: {data}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(h: ConsoleHandler<Vec<u8>>) -> String {
        String::from_utf8(h.into_inner()).unwrap()
    }

    #[test]
    fn prints_events_in_sample_format() {
        let mut h = ConsoleHandler::new(Vec::new());
        h.on_message("msg_1", "in_progress");
        h.on_text_delta("msg_1", "Hello");
        h.on_run_step("step_1", "tool_calls", "completed");
        h.on_unhandled("custom.ping", &json!({"n": 1}));
        h.on_error("overloaded");
        h.on_done();
        assert_eq!(
            output(h),
            "ThreadMessage created. ID: msg_1, Status: in_progress\n\
             Text delta received: Hello\n\
             RunStep type: tool_calls, Status: completed\n\
             Unhandled Event Type: custom.ping, Data: {\"n\":1}\n\
             An error occurred. Data: overloaded\n\
             Stream completed.\n"
        );
    }

    #[test]
    fn failed_run_prints_last_error() {
        let mut h = ConsoleHandler::new(Vec::new());
        let err = RunError {
            code: "rate_limit_exceeded".into(),
            message: "slow down".into(),
        };
        h.on_run_status("run_1", &RunStatus::Failed, Some(&err));
        assert_eq!(
            output(h),
            "ThreadRun status: failed\nRun failed. Error: rate_limit_exceeded: slow down\n"
        );
    }

    #[test]
    fn tool_results_show_verdict() {
        let mut h = ConsoleHandler::new(Vec::new());
        h.on_tool_result("c1", "fetch_weather", &ToolOutcome::Success(json!({"weather": "Sunny"})));
        h.on_tool_result("c2", "send_email", &ToolOutcome::Failure("bad".into()));
        let out = output(h);
        assert!(out.contains("[tool] fetch_weather (c1) => OK {\"weather\":\"Sunny\"}"));
        assert!(out.contains("[tool] send_email (c2) => ERR {\"error\":\"bad\"}"));
    }
}
