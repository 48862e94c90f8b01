use claude_notifier::config::{EventConditions, RateLimitSettings, WorkHours};
use claude_notifier::{ConfigLoader, EventManager, HookContext};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"
channels:
  dingtalk:
    enabled: true
    webhook: https://oapi.example.invalid/robot/send
  email:
    enabled: false

notifications:
  default_channels: [dingtalk]
  rate_limiting:
    enabled: true
    max_per_minute: 10
  work_hours:
    start_hour: 8
    end_hour: 20
    weekdays_only: false

events:
  sensitive_operation:
    enabled: true
    channels: [dingtalk]
    template: sensitive_operation_default
    patterns:
      - 'terraform\s+destroy'
    conditions:
      cooldown: 30
  session_start:
    enabled: false

custom_events:
  deploy:
    name: Deployment
    priority: high
    triggers:
      - type: pattern
        pattern: 'kubectl\s+apply'
    conditions:
      max_frequency: 2
      time_window: 300
    channels: [dingtalk]

templates:
  custom_dir: /nonexistent/templates
"#;

#[test]
fn test_full_config_round_trip_through_loader() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = ConfigLoader::load(&path).unwrap();

    assert_eq!(config.enabled_channels(), vec!["dingtalk"]);
    assert_eq!(
        config.notifications.rate_limiting,
        Some(RateLimitSettings {
            enabled: true,
            max_per_minute: 10
        })
    );
    assert_eq!(
        config.notifications.work_hours,
        WorkHours {
            start_hour: 8,
            end_hour: 20,
            weekdays_only: false
        }
    );

    let sensitive = config.event_settings("sensitive_operation").unwrap();
    assert_eq!(sensitive.patterns, vec![r"terraform\s+destroy"]);
    assert_eq!(
        sensitive.conditions,
        Some(EventConditions {
            cooldown: Some(30),
            max_frequency: None,
            time_window: None
        })
    );
    assert_eq!(config.custom_events.keys().collect::<Vec<_>>(), vec!["deploy"]);
    assert!(ConfigLoader::validate(&config).is_empty());
}

#[test]
fn test_loaded_config_drives_manager() {
    let config = ConfigLoader::load_from_str(FULL_CONFIG).unwrap();
    let manager = EventManager::new(&config);

    let fired = manager.process_context(&HookContext::from_value(json!({
        "tool_input": "terraform destroy -auto-approve",
        "tool_name": "Bash"
    })));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event_id, "sensitive_operation");
    assert_eq!(fired[0].channels, vec!["dingtalk"]);
    assert_eq!(fired[0].data["matched_pattern"], json!("custom_1"));

    let deploy = HookContext::from_value(json!({ "tool_input": "kubectl apply -f app.yaml" }));
    assert_eq!(manager.process_context(&deploy).len(), 1);
    assert_eq!(manager.process_context(&deploy).len(), 1);
    assert!(manager.process_context(&deploy).is_empty());
}

#[test]
fn test_malformed_custom_event_does_not_fail_config() {
    let config = ConfigLoader::load_from_str(
        r#"
custom_events:
  broken:
    name: 42
    triggers: oops
  fine:
    name: Fine
    triggers: [{ type: function, function: is_weekend }]
"#,
    )
    .unwrap();
    assert_eq!(config.custom_events.len(), 2);
    assert_eq!(EventManager::new(&config).custom_registry().list(), vec!["fine"]);
}

#[test]
fn test_unknown_routing_channel_is_reported() {
    let config = ConfigLoader::load_from_str(
        r#"
channels:
  telegram: { token: abc }
events:
  error_occurred:
    channels: [telegram, sms]
"#,
    )
    .unwrap();
    let warnings = ConfigLoader::validate(&config);
    assert_eq!(warnings, vec!["events.error_occurred routes to unknown channel 'sms'"]);
}

#[test]
fn test_configured_patterns_reach_sensitive_function() {
    let config = ConfigLoader::load_from_str(
        r#"
events:
  sensitive_operation:
    enabled: false
    patterns: ['terraform\s+destroy']
custom_events:
  infra_teardown:
    name: Infra teardown
    triggers: [{ type: function, function: is_sensitive_command }]
"#,
    )
    .unwrap();
    let manager = EventManager::new(&config);

    let fired = manager.process_context(&HookContext::from_value(json!({
        "tool_input": "terraform destroy -auto-approve"
    })));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].event_id, "infra_teardown");
}
