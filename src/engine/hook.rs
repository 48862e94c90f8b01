//! Normalization of raw Claude Code hook payloads into a `HookContext`

use serde_json::{Map, Value};
use tracing::debug;

use super::context::{basename, coerce_to_string, HookContext};

/// Longest error excerpt copied into `error_message`
const ERROR_EXCERPT_CHARS: usize = 200;

impl HookContext {
    /// Build a context from a hook payload as delivered on stdin
    ///
    /// `event_name` takes precedence over the payload's `hook_event_name`.
    pub fn from_hook_payload(event_name: Option<&str>, payload: Value) -> Self {
        let mut fields = match payload {
            Value::Object(map) => map,
            other => {
                debug!("Hook payload is not an object: {}", other);
                Map::new()
            }
        };

        let hook_event = event_name
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                fields
                    .get("hook_event_name")
                    .or_else(|| fields.get("hookEventName"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        if let Some(hook_event) = &hook_event {
            fields.insert("hook_event".into(), Value::String(hook_event.clone()));
        }

        flatten_tool_input(&mut fields);
        map_tool_error(&mut fields);

        if hook_event.as_deref() == Some("Notification") && !fields.contains_key("notification_type") {
            if let Some(kind) = fields.get("type").cloned() {
                fields.insert("notification_type".into(), kind);
            }
        }

        if !fields.contains_key("project") {
            if let Some(project) = fields
                .get("cwd")
                .and_then(Value::as_str)
                .and_then(basename)
            {
                fields.insert("project".into(), Value::String(project));
            }
        }

        HookContext::from(fields)
    }
}

/// Lift `command` / `file_path` out of an object `tool_input` and replace it
/// by a single string so patterns can match against it.
fn flatten_tool_input(fields: &mut Map<String, Value>) {
    let Some(Value::Object(input)) = fields.get("tool_input").cloned() else {
        return;
    };

    let command = input.get("command").and_then(coerce_to_string);
    let file_path = input
        .get("file_path")
        .or_else(|| input.get("path"))
        .and_then(coerce_to_string);

    if let Some(command) = &command {
        fields
            .entry("command")
            .or_insert_with(|| Value::String(command.clone()));
    }
    if let Some(file_path) = &file_path {
        fields
            .entry("file_path")
            .or_insert_with(|| Value::String(file_path.clone()));
    }

    let text = command
        .or(file_path)
        .unwrap_or_else(|| Value::Object(input.clone()).to_string());
    fields.insert("tool_input".into(), Value::String(text));
    fields.insert("tool_input_raw".into(), Value::Object(input));
}

fn map_tool_error(fields: &mut Map<String, Value>) {
    let result = ["tool_response", "tool_result"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_object))
        .cloned();
    let Some(result) = result else {
        return;
    };

    let is_error = result
        .get("is_error")
        .or_else(|| result.get("isError"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !is_error {
        return;
    }

    fields.entry("has_error").or_insert(Value::Bool(true));
    if !fields.contains_key("error_message") {
        let content = match result.get("content").or_else(|| result.get("error")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let message = if content.trim().is_empty() {
            let tool = fields
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or("tool");
            format!("{} failed", tool)
        } else {
            content.chars().take(ERROR_EXCERPT_CHARS).collect()
        };
        fields.insert("error_message".into(), Value::String(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_pre_tool_use_flattens_command() {
        let ctx = HookContext::from_hook_payload(
            Some("PreToolUse"),
            json!({
                "session_id": "abc",
                "tool_name": "Bash",
                "tool_input": { "command": "sudo rm -rf /tmp/x", "description": "cleanup" },
                "cwd": "/home/dev/app-prod"
            }),
        );
        assert_eq!(ctx.get_str("hook_event").as_deref(), Some("PreToolUse"));
        assert_eq!(ctx.get_str("tool_input").as_deref(), Some("sudo rm -rf /tmp/x"));
        assert_eq!(ctx.get_str("command").as_deref(), Some("sudo rm -rf /tmp/x"));
        assert_eq!(ctx.get_str("tool_input_raw.description").as_deref(), Some("cleanup"));
        assert_eq!(ctx.get_str("tool_input.command").as_deref(), Some("sudo rm -rf /tmp/x"));
        assert_eq!(ctx.get_str("tool_input.description").as_deref(), Some("cleanup"));
        assert!(ctx.get("tool_input.missing").is_none());
        assert_eq!(ctx.get_str("project").as_deref(), Some("app-prod"));
    }

    #[test]
    fn test_edit_tool_input_becomes_file_path() {
        let ctx = HookContext::from_hook_payload(
            None,
            json!({
                "hook_event_name": "PreToolUse",
                "tool_name": "Edit",
                "tool_input": { "file_path": "/src/main.rs", "old_string": "a" }
            }),
        );
        assert_eq!(ctx.get_str("hook_event").as_deref(), Some("PreToolUse"));
        assert_eq!(ctx.get_str("tool_input").as_deref(), Some("/src/main.rs"));
        assert_eq!(ctx.get_str("file_path").as_deref(), Some("/src/main.rs"));
    }

    #[test]
    fn test_post_tool_use_error_is_mapped() {
        let ctx = HookContext::from_hook_payload(
            Some("PostToolUse"),
            json!({
                "tool_name": "Bash",
                "tool_result": { "is_error": true, "content": "permission denied" }
            }),
        );
        assert_eq!(ctx.get_bool("has_error"), Some(true));
        assert_eq!(ctx.get_str("error_message").as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_post_tool_use_success_sets_nothing() {
        let ctx = HookContext::from_hook_payload(
            Some("PostToolUse"),
            json!({ "tool_name": "Read", "tool_response": { "is_error": false } }),
        );
        assert!(!ctx.contains("has_error"));
        assert!(!ctx.contains("error_message"));
    }

    #[test]
    fn test_empty_error_content_names_tool() {
        let ctx = HookContext::from_hook_payload(
            Some("PostToolUse"),
            json!({ "tool_name": "Write", "tool_response": { "is_error": true } }),
        );
        assert_eq!(ctx.get_str("error_message").as_deref(), Some("Write failed"));
    }

    #[test]
    fn test_notification_type_is_copied() {
        let ctx = HookContext::from_hook_payload(
            Some("Notification"),
            json!({ "type": "permission_prompt", "message": "Allow Bash?" }),
        );
        assert_eq!(ctx.get_str("notification_type").as_deref(), Some("permission_prompt"));
    }

    #[test]
    fn test_explicit_project_is_kept() {
        let ctx = HookContext::from_hook_payload(
            Some("Stop"),
            json!({ "project": "named", "cwd": "/tmp/other" }),
        );
        assert_eq!(ctx.project_name(), "named");
    }
}
