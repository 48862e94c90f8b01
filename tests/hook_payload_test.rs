use claude_notifier::{EventManager, HookContext, NotifierConfig};
use pretty_assertions::assert_eq;
use serde_json::json;

fn fire(event_name: Option<&str>, payload: serde_json::Value) -> Vec<String> {
    let mut manager = EventManager::new(&NotifierConfig::default());
    manager.enable_event("idle_prompt");
    manager
        .process_context(&HookContext::from_hook_payload(event_name, payload))
        .into_iter()
        .map(|e| e.event_id)
        .collect()
}

#[test]
fn test_pre_tool_use_bash_payload() {
    let fired = fire(
        Some("PreToolUse"),
        json!({
            "session_id": "s-1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/home/dev/api",
            "tool_name": "Bash",
            "tool_input": { "command": "git push --force origin main", "description": "push" }
        }),
    );
    assert_eq!(fired, vec!["sensitive_operation"]);
}

#[test]
fn test_pre_tool_use_edit_is_not_sensitive() {
    let fired = fire(
        Some("PreToolUse"),
        json!({
            "tool_name": "Edit",
            "tool_input": { "file_path": "/etc/sudoers", "old_string": "a", "new_string": "b" }
        }),
    );
    assert!(fired.is_empty());
}

#[test]
fn test_post_tool_use_error_payload() {
    let fired = fire(
        Some("PostToolUse"),
        json!({
            "tool_name": "Bash",
            "tool_input": { "command": "cargo test" },
            "tool_response": { "is_error": true, "content": "exit status 101" }
        }),
    );
    assert_eq!(fired, vec!["error_occurred"]);
}

#[test]
fn test_stop_payload_uses_hook_event_name() {
    let fired = fire(None, json!({ "hook_event_name": "Stop", "stop_hook_active": false }));
    assert_eq!(fired, vec!["task_completion"]);
}

#[test]
fn test_subagent_stop_payload() {
    let fired = fire(Some("SubagentStop"), json!({ "stop_hook_active": false }));
    assert_eq!(fired, vec!["task_completion"]);
}

#[test]
fn test_notification_payloads() {
    let permission = fire(
        Some("Notification"),
        json!({ "type": "permission_prompt", "message": "Claude needs your permission to use Bash" }),
    );
    assert_eq!(permission, vec!["confirmation_required"]);

    let idle = fire(
        Some("Notification"),
        json!({ "type": "idle_prompt", "message": "Claude is waiting for your input" }),
    );
    assert_eq!(idle, vec!["idle_prompt"]);
}

#[test]
fn test_argument_overrides_payload_event_name() {
    let ctx = HookContext::from_hook_payload(Some("Stop"), json!({ "hook_event_name": "PreToolUse" }));
    assert_eq!(ctx.get_str("hook_event").as_deref(), Some("Stop"));
}

#[test]
fn test_non_object_payload_is_empty_context() {
    let ctx = HookContext::from_hook_payload(Some("Stop"), json!("garbage"));
    assert_eq!(ctx.get_str("hook_event").as_deref(), Some("Stop"));
    assert_eq!(ctx.fields().len(), 1);
}

#[test]
fn test_custom_rules_can_address_nested_tool_input() {
    let config: NotifierConfig = serde_yaml_ng::from_str(
        r#"
custom_events:
  env_edit:
    name: Env file edited
    triggers:
      - type: condition
        field: tool_input.file_path
        operator: ends_with
        value: .env
    data_extractors:
      path: { type: field, field: tool_input.file_path }
"#,
    )
    .unwrap();
    let manager = EventManager::new(&config);

    let fired = manager.process_context(&HookContext::from_hook_payload(
        Some("PreToolUse"),
        json!({
            "tool_name": "Write",
            "tool_input": { "file_path": "/srv/app/.env", "content": "SECRET=1" }
        }),
    ));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event_id, "env_edit");
    assert_eq!(fired[0].data["path"], json!("/srv/app/.env"));
}
