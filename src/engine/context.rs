use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};

/// Hook context evaluated by every event
///
/// A flat map of hook fields plus the evaluation timestamp. Field lookup
/// tries the literal key first, then a dotted path into nested objects
/// (`tool_input.command`). When the head of the path was flattened by hook
/// normalization, the path is resolved against `<head>_raw` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    fields: Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HookContext {
    /// Empty context stamped with the current time
    pub fn new() -> Self {
        Self {
            fields: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Build from a JSON value; non-objects produce an empty context
    pub fn from_value(value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn local_time(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Look up a field by literal key, then by dotted path
    pub fn get(&self, field: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(field) {
            return Some(value);
        }
        if !field.contains('.') {
            return None;
        }

        let (head, rest) = field.split_once('.')?;
        walk_path(self.fields.get(head)?, rest).or_else(|| {
            // Flattened fields keep their original shape under `<name>_raw`
            let raw = self.fields.get(&format!("{}_raw", head))?;
            walk_path(raw, rest)
        })
    }

    /// Present and not null
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_null())
    }

    /// Field value coerced to a string (strings, numbers, booleans)
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.get(field).and_then(coerce_to_string)
    }

    /// Boolean field; accepts `true`/`false` strings as well
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The command line for command-style tools
    ///
    /// `tool_input` when it is a string, else `tool_input.command`, else `command`.
    pub fn command_text(&self) -> Option<String> {
        match self.fields.get("tool_input") {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Object(map)) => {
                if let Some(command) = map.get("command").and_then(coerce_to_string) {
                    return Some(command);
                }
            }
            _ => {}
        }
        self.fields.get("command").and_then(coerce_to_string)
    }

    /// `project`, else the basename of `cwd`, else `"unknown"`
    pub fn project_name(&self) -> String {
        if let Some(project) = self.get_str("project").filter(|p| !p.is_empty()) {
            return project;
        }
        self.get_str("cwd")
            .as_deref()
            .and_then(basename)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Evaluation time as local `%Y-%m-%d %H:%M:%S`
    pub fn formatted_timestamp(&self) -> String {
        self.local_time().format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl From<Value> for HookContext {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for HookContext {
    fn from(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            timestamp: Utc::now(),
        }
    }
}

fn walk_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => None,
    })
}

/// Strings as-is, numbers and booleans via `to_string`; everything else is not coercible
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn basename(path: &str) -> Option<String> {
    std::path::Path::new(path.trim_end_matches(['/', '\\']))
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_direct_key_wins_over_dotted_path() {
        let ctx = HookContext::from_value(json!({
            "tool_input.command": "literal",
            "tool_input": { "command": "nested" }
        }));
        assert_eq!(ctx.get_str("tool_input.command").as_deref(), Some("literal"));
    }

    #[test]
    fn test_dotted_path_lookup() {
        let ctx = HookContext::from_value(json!({
            "tool_input": { "command": "ls -la", "args": ["a", "b"] },
            "tool_response": { "is_error": true }
        }));
        assert_eq!(ctx.get_str("tool_input.command").as_deref(), Some("ls -la"));
        assert_eq!(ctx.get_str("tool_input.args.1").as_deref(), Some("b"));
        assert_eq!(ctx.get_bool("tool_response.is_error"), Some(true));
        assert!(ctx.get("tool_input.missing").is_none());
        assert!(ctx.get("tool_input.command.deeper").is_none());
    }

    #[test]
    fn test_string_coercion() {
        let ctx = HookContext::from_value(json!({
            "count": 3,
            "flag": false,
            "nothing": null,
            "list": [1]
        }));
        assert_eq!(ctx.get_str("count").as_deref(), Some("3"));
        assert_eq!(ctx.get_str("flag").as_deref(), Some("false"));
        assert_eq!(ctx.get_str("nothing"), None);
        assert_eq!(ctx.get_str("list"), None);
        assert!(!ctx.contains("nothing"));
        assert!(ctx.contains("flag"));
    }

    #[test]
    fn test_command_text_sources() {
        let plain = HookContext::from_value(json!({ "tool_input": "rm -rf /tmp/x" }));
        assert_eq!(plain.command_text().as_deref(), Some("rm -rf /tmp/x"));

        let nested = HookContext::from_value(json!({ "tool_input": { "command": "git push" } }));
        assert_eq!(nested.command_text().as_deref(), Some("git push"));

        let fallback = HookContext::from_value(json!({
            "tool_input": { "file_path": "/a" },
            "command": "make"
        }));
        assert_eq!(fallback.command_text().as_deref(), Some("make"));

        assert_eq!(HookContext::new().command_text(), None);
    }

    #[test]
    fn test_project_name_fallbacks() {
        let explicit = HookContext::from_value(json!({ "project": "app-prod", "cwd": "/x/y" }));
        assert_eq!(explicit.project_name(), "app-prod");

        let from_cwd = HookContext::from_value(json!({ "cwd": "/home/dev/my-repo/" }));
        assert_eq!(from_cwd.project_name(), "my-repo");

        assert_eq!(HookContext::new().project_name(), "unknown");
    }

    #[test]
    fn test_non_object_value_is_empty() {
        let ctx = HookContext::from_value(json!([1, 2, 3]));
        assert!(ctx.fields().is_empty());
    }
}
