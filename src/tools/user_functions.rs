//! Sample functions exposed to the agent.
use anyhow::Result;
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde_json::{Value as JsonValue, json};
use tracing::info;

use crate::tools::{ParamSpec, ParamType, ToolArgs, ToolDescriptor, ToolError, ToolRegistry};

const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fetch_current_datetime(args: &ToolArgs) -> Result<JsonValue> {
    let format = args
        .get("format")
        .and_then(JsonValue::as_str)
        .unwrap_or(DEFAULT_DATETIME_FORMAT);
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        anyhow::bail!("invalid datetime format: {format}");
    }
    let now = Local::now().format_with_items(items.into_iter()).to_string();
    Ok(json!({ "current_time": now }))
}

pub fn fetch_weather(args: &ToolArgs) -> Result<JsonValue> {
    let location = args
        .get("location")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let weather = match location {
        "New York" => "Sunny, 25°C",
        "London" => "Cloudy, 18°C",
        "Tokyo" => "Rainy, 22°C",
        _ => "Weather data not available for this location.",
    };
    Ok(json!({ "weather": weather }))
}

/// Mock mail transport: records the message in the log instead of sending it.
pub fn send_email(args: &ToolArgs) -> Result<JsonValue> {
    let recipient = args
        .get("recipient")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let subject = args
        .get("subject")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let body_len = args
        .get("body")
        .and_then(JsonValue::as_str)
        .map(str::len)
        .unwrap_or(0);
    if !recipient.contains('@') {
        anyhow::bail!("invalid recipient address: {recipient}");
    }
    info!(recipient, subject, body_len, "sending email");
    Ok(json!({ "message": format!("Email successfully sent to {recipient}.") }))
}

pub fn convert_temperature(args: &ToolArgs) -> Result<JsonValue> {
    let celsius = args
        .get("celsius")
        .and_then(JsonValue::as_f64)
        .unwrap_or_default();
    Ok(json!({ "fahrenheit": celsius * 9.0 / 5.0 + 32.0 }))
}

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "fetch_current_datetime",
            "Get the current time as a JSON string, optionally formatted.",
            vec![ParamSpec::optional(
                "format",
                ParamType::String,
                "strftime-style format for the current time. Defaults to '%Y-%m-%d %H:%M:%S'.",
            )],
            fetch_current_datetime,
        ),
        ToolDescriptor::new(
            "fetch_weather",
            "Fetch the weather information for the specified location.",
            vec![ParamSpec::required(
                "location",
                ParamType::String,
                "The location to fetch weather for.",
            )],
            fetch_weather,
        ),
        ToolDescriptor::new(
            "send_email",
            "Send an email with the specified subject and body to the recipient.",
            vec![
                ParamSpec::required("recipient", ParamType::String, "Email address of the recipient."),
                ParamSpec::required("subject", ParamType::String, "Subject of the email."),
                ParamSpec::required("body", ParamType::String, "Body content of the email."),
            ],
            send_email,
        ),
        ToolDescriptor::new(
            "convert_temperature",
            "Convert a temperature from Celsius to Fahrenheit.",
            vec![ParamSpec::required(
                "celsius",
                ParamType::Number,
                "Temperature in Celsius.",
            )],
            convert_temperature,
        ),
    ]
}

pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    let mut reg = ToolRegistry::new();
    for d in descriptors() {
        reg.register(d)?;
    }
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_functions() {
        let reg = default_registry().unwrap();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(
            names,
            vec![
                "fetch_current_datetime",
                "fetch_weather",
                "send_email",
                "convert_temperature"
            ]
        );
    }

    #[test]
    fn weather_lookup() {
        let reg = default_registry().unwrap();
        let out = reg
            .invoke("fetch_weather", &json!({"location": "New York"}))
            .unwrap();
        assert_eq!(out["weather"], "Sunny, 25°C");
        let out = reg
            .invoke("fetch_weather", &json!({"location": "Atlantis"}))
            .unwrap();
        assert_eq!(
            out["weather"],
            "Weather data not available for this location."
        );
    }

    #[test]
    fn datetime_honours_format() {
        let reg = default_registry().unwrap();
        let out = reg
            .invoke("fetch_current_datetime", &json!({"format": "%Y"}))
            .unwrap();
        let year = out["current_time"].as_str().unwrap();
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn send_email_rejects_bad_recipient() {
        let reg = default_registry().unwrap();
        let ok = reg
            .invoke(
                "send_email",
                &json!({"recipient": "a@example.com", "subject": "hi", "body": "there"}),
            )
            .unwrap();
        assert_eq!(ok["message"], "Email successfully sent to a@example.com.");

        let err = reg
            .invoke(
                "send_email",
                &json!({"recipient": "nobody", "subject": "hi", "body": "there"}),
            )
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[test]
    fn temperature_conversion() {
        let reg = default_registry().unwrap();
        let out = reg
            .invoke("convert_temperature", &json!({"celsius": 100}))
            .unwrap();
        assert_eq!(out["fahrenheit"], json!(212.0));
    }
}
