use anyhow::Result;
use std::io::Write;

use crate::service::types::ThreadMessage;
use crate::tools::ToolRegistry;

/// Print the tool definitions exactly as they are advertised to the service.
pub fn print_tool_defs<W: Write>(out: &mut W, registry: &ToolRegistry) -> Result<()> {
    let defs = registry.tool_defs();
    writeln!(out, "{}", serde_json::to_string_pretty(&defs)?)?;
    Ok(())
}

pub fn print_messages<W: Write>(out: &mut W, messages: &[ThreadMessage]) -> Result<()> {
    writeln!(out, "Messages:")?;
    for m in messages {
        writeln!(out, "{}: {}", m.role, m.text())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::types::{MessageContent, MessageRole, MessageText};
    use crate::tools::user_functions;

    #[test]
    fn tool_defs_are_pretty_json() {
        let reg = user_functions::default_registry().unwrap();
        let mut out = Vec::new();
        print_tool_defs(&mut out, &reg).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let names: Vec<_> = v
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["function"]["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "fetch_current_datetime",
                "fetch_weather",
                "send_email",
                "convert_temperature"
            ]
        );
        assert!(v.as_array().unwrap().iter().all(|d| d["type"] == "function"));
    }

    #[test]
    fn messages_print_role_and_text() {
        let msg = |role, text: &str| ThreadMessage {
            id: "m".into(),
            thread_id: None,
            role,
            status: None,
            content: vec![MessageContent::Text {
                text: MessageText { value: text.into() },
            }],
        };
        let mut out = Vec::new();
        print_messages(
            &mut out,
            &[
                msg(MessageRole::User, "Hi"),
                msg(MessageRole::Assistant, "Hello!"),
            ],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Messages:\nuser: Hi\nassistant: Hello!\n"
        );
    }
}
