//! Tool request types and the built-in tool catalog
//!
//! Tool arguments arrive as a weakly typed JSON object. Each request type
//! coerces its own fields here so the core only ever sees typed values.

use crate::gateway::logs::DEFAULT_TAIL_LINES;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Run an allowlisted catalog command
pub const TOOL_RUN: &str = "box-run";
/// Run the catalog's `health` command
pub const TOOL_HEALTH: &str = "box-health";
/// Tail allowlisted log files
pub const TOOL_READ_LOGS: &str = "box-read-logs";
/// Read one allowlisted file
pub const TOOL_READ_CONTRACT: &str = "box-read-contract";

/// Sentinel returned when no log qualifies
pub const NO_MATCHING_LOGS: &str = "(no matching logs)";

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandRequest {
    /// Command name, as declared in the catalog and allowlisted by the policy
    #[serde(default, deserialize_with = "coerce_string")]
    pub command: String,
    /// Extra arguments, each passed to the shell as one quoted word
    #[serde(default, deserialize_with = "coerce_string_list")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HealthCheckRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadLogsRequest {
    /// Glob over repository-relative paths, e.g. `logs/**/*.log`
    #[serde(default, deserialize_with = "coerce_string")]
    pub glob: String,
    /// Trailing lines per file (1-2000)
    #[serde(
        rename = "tailLines",
        default = "default_tail_lines",
        deserialize_with = "coerce_tail_lines"
    )]
    pub tail_lines: usize,
    /// Keep only lines containing this substring
    #[serde(default, deserialize_with = "coerce_optional_string")]
    pub contains: Option<String>,
}

impl Default for ReadLogsRequest {
    fn default() -> Self {
        Self {
            glob: String::new(),
            tail_lines: DEFAULT_TAIL_LINES,
            contains: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileRequest {
    /// Repository-relative path
    #[serde(default, deserialize_with = "coerce_string")]
    pub path: String,
}

fn default_tail_lines() -> usize {
    DEFAULT_TAIL_LINES
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn coerce_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn coerce_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_to_string(Value::deserialize(deserializer)?).filter(|s| !s.is_empty()))
}

fn coerce_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|v| scalar_to_string(v).unwrap_or_else(|| "null".to_string()))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn coerce_tail_lines<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let requested = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    Ok(match requested {
        Some(n) if n.is_finite() => n.max(0.0) as usize,
        _ => DEFAULT_TAIL_LINES,
    })
}

/// Text result of a tool call, with the soft-failure flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    /// Successful text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// MCP `tools/call` result body
    pub fn to_mcp(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error,
        })
    }
}

fn tool_definition<T: JsonSchema>(name: &str, description: &str, required: &[&str]) -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
        map.insert("type".to_string(), json!("object"));
        map.insert("required".to_string(), json!(required));
    }

    json!({
        "name": name,
        "description": description,
        "inputSchema": schema,
    })
}

/// Tool listing used when the repository ships no tool document
pub fn builtin_tools() -> Vec<Value> {
    vec![
        tool_definition::<RunCommandRequest>(
            TOOL_RUN,
            "Run an allowlisted command from the box catalog",
            &["command"],
        ),
        tool_definition::<HealthCheckRequest>(
            TOOL_HEALTH,
            "Run the box health command",
            &[],
        ),
        tool_definition::<ReadLogsRequest>(
            TOOL_READ_LOGS,
            "Tail allowlisted log files under logs/ matching a glob",
            &["glob"],
        ),
        tool_definition::<ReadFileRequest>(
            TOOL_READ_CONTRACT,
            "Read an allowlisted repository file",
            &["path"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_coercion() {
        let request: RunCommandRequest =
            serde_json::from_value(json!({"command": "test", "args": ["-v", 3, true, null]}))
                .unwrap();

        assert_eq!(request.command, "test");
        assert_eq!(request.args, vec!["-v", "3", "true", "null"]);

        let request: RunCommandRequest =
            serde_json::from_value(json!({"command": 42, "args": "not-a-list"})).unwrap();
        assert_eq!(request.command, "42");
        assert!(request.args.is_empty());

        let request: RunCommandRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.command.is_empty());
    }

    #[test]
    fn test_read_logs_defaults() {
        let request: ReadLogsRequest = serde_json::from_value(json!({"glob": "logs/*.log"})).unwrap();
        assert_eq!(request.tail_lines, 200);
        assert_eq!(request.contains, None);

        let request: ReadLogsRequest =
            serde_json::from_value(json!({"glob": "x", "tailLines": "15", "contains": ""})).unwrap();
        assert_eq!(request.tail_lines, 15);
        assert_eq!(request.contains, None);

        let request: ReadLogsRequest =
            serde_json::from_value(json!({"glob": "x", "tailLines": "lots", "contains": "ERR"}))
                .unwrap();
        assert_eq!(request.tail_lines, 200);
        assert_eq!(request.contains.as_deref(), Some("ERR"));

        let request: ReadLogsRequest =
            serde_json::from_value(json!({"glob": "x", "tailLines": -4})).unwrap();
        assert_eq!(request.tail_lines, 0);
    }

    #[test]
    fn test_builtin_tools() {
        let tools = builtin_tools();
        let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        assert_eq!(names, vec![TOOL_RUN, TOOL_HEALTH, TOOL_READ_LOGS, TOOL_READ_CONTRACT]);

        let logs = &tools[2]["inputSchema"];
        assert_eq!(logs["type"], "object");
        assert_eq!(logs["required"], json!(["glob"]));
        assert!(logs["properties"].get("tailLines").is_some());
    }

    #[test]
    fn test_to_mcp() {
        let response = ToolResponse {
            text: "exit_code=1".to_string(),
            is_error: true,
        };
        assert_eq!(
            response.to_mcp(),
            json!({"content": [{"type": "text", "text": "exit_code=1"}], "isError": true})
        );
    }
}
