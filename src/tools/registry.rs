use anyhow::Result;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::service::types::{ToolDef, ToolFunctionDef};
use crate::tools::ToolError;

pub type ToolArgs = Map<String, JsonValue>;

/// Local implementation behind a tool. Runs synchronously and may perform any I/O.
pub type ToolFn = Arc<dyn Fn(&ToolArgs) -> Result<JsonValue> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    fn accepts(self, value: &JsonValue) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    callable: ToolFn,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    pub fn new<F>(name: &str, description: &str, params: Vec<ParamSpec>, f: F) -> Self
    where
        F: Fn(&ToolArgs) -> Result<JsonValue> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
            callable: Arc::new(f),
        }
    }

    /// JSON Schema object describing the parameters, in declaration order.
    pub fn parameters_schema(&self) -> JsonValue {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({"type": p.kind.as_str(), "description": p.description}),
            );
            if p.required {
                required.push(JsonValue::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn tool_def(&self) -> ToolDef {
        ToolDef {
            kind: "function".into(),
            function: ToolFunctionDef {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.parameters_schema(),
            },
        }
    }

    fn validate<'a>(&self, arguments: &'a JsonValue) -> Result<&'a ToolArgs, ToolError> {
        let args = arguments
            .as_object()
            .ok_or_else(|| ToolError::invalid(&self.name, "arguments must be a JSON object"))?;
        for p in &self.params {
            match args.get(&p.name) {
                None | Some(JsonValue::Null) => {
                    if p.required {
                        return Err(ToolError::invalid(
                            &self.name,
                            format!("missing required parameter `{}`", p.name),
                        ));
                    }
                }
                Some(v) if !p.kind.accepts(v) => {
                    return Err(ToolError::invalid(
                        &self.name,
                        format!("parameter `{}` must be of type {}", p.name, p.kind.as_str()),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(args)
    }
}

/// Name -> tool mapping owned by one agent session.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), ToolError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(ToolError::Duplicate(descriptor.name));
        }
        debug!(tool = %descriptor.name, "registered tool");
        self.order.push(descriptor.name.clone());
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions advertised to the agent service, in registration order.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(ToolDescriptor::tool_def)
            .collect()
    }

    pub fn invoke(&self, name: &str, arguments: &JsonValue) -> Result<JsonValue, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        let args = tool.validate(arguments)?;
        debug!(tool = %name, "invoking tool");
        (tool.callable)(args).map_err(|source| ToolError::Execution {
            tool: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    fn weather() -> ToolDescriptor {
        ToolDescriptor::new(
            "get_weather",
            "Weather for a city",
            vec![ParamSpec::required("city", ParamType::String, "City name")],
            |args| {
                let city = args["city"].as_str().unwrap_or_default();
                Ok(json!(format!("Sunny in {city}")))
            },
        )
    }

    #[test]
    fn invoke_returns_callable_result() {
        let mut reg = ToolRegistry::new();
        reg.register(weather()).unwrap();
        let out = reg
            .invoke("get_weather", &json!({"city": "New York"}))
            .unwrap();
        assert_eq!(out, json!("Sunny in New York"));
    }

    #[test]
    fn invoke_unknown_tool_fails() {
        let reg = ToolRegistry::new();
        let err = reg.invoke("nope", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::Unknown(n) if n == "nope"));
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut reg = ToolRegistry::new();
        reg.register(weather()).unwrap();
        let second = ToolDescriptor::new("get_weather", "other", vec![], |_| Ok(json!("second")));
        let err = reg.register(second).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(_)));
        assert_eq!(reg.len(), 1);
        let out = reg.invoke("get_weather", &json!({"city": "Oslo"})).unwrap();
        assert_eq!(out, json!("Sunny in Oslo"));
    }

    #[test]
    fn argument_validation() {
        let mut reg = ToolRegistry::new();
        reg.register(weather()).unwrap();

        let err = reg.invoke("get_weather", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = reg.invoke("get_weather", &json!({"city": 3})).unwrap_err();
        assert!(err.to_string().contains("must be of type string"));

        let err = reg.invoke("get_weather", &json!(["Paris"])).unwrap_err();
        assert!(err.to_string().contains("JSON object"));

        let err = reg.invoke("get_weather", &json!({"city": null})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn callable_failure_is_wrapped() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolDescriptor::new("boom", "always fails", vec![], |_| {
            bail!("smtp unreachable")
        }))
        .unwrap();
        let err = reg.invoke("boom", &json!({})).unwrap_err();
        match err {
            ToolError::Execution { tool, source } => {
                assert_eq!(tool, "boom");
                assert_eq!(source.to_string(), "smtp unreachable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tool_defs_follow_registration_order() {
        let mut reg = ToolRegistry::new();
        reg.register(weather()).unwrap();
        reg.register(ToolDescriptor::new(
            "send_email",
            "Send an e-mail",
            vec![
                ParamSpec::required("to", ParamType::String, "Recipient"),
                ParamSpec::optional("cc", ParamType::Array, "Copies"),
            ],
            |_| Ok(json!(true)),
        ))
        .unwrap();

        let defs = reg.tool_defs();
        let names: Vec<_> = defs.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["get_weather", "send_email"]);
        assert_eq!(defs[1].kind, "function");
        assert_eq!(defs[1].function.parameters["required"], json!(["to"]));
        assert_eq!(
            defs[1].function.parameters["properties"]["cc"]["type"],
            json!("array")
        );
    }
}
