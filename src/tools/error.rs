use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool already registered: {0}")]
    Duplicate(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool {tool} failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ToolError {
    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_display() {
        let error = ToolError::Unknown("nope".to_string());
        assert_eq!(format!("{}", error), "unknown tool: nope");

        let error = ToolError::invalid("send_email", "missing required parameter `subject`");
        assert_eq!(
            format!("{}", error),
            "invalid arguments for send_email: missing required parameter `subject`"
        );

        let error = ToolError::Execution {
            tool: "boom".into(),
            source: anyhow::anyhow!("kaput"),
        };
        assert_eq!(format!("{}", error), "tool boom failed: kaput");
    }
}
