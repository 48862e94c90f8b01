use claude_notifier::channels::{Channel, ChannelRegistry, LogChannel};
use claude_notifier::{ConfigLoader, EventManager, HookContext, Notifier, NotifierConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct Recording {
    name: String,
    succeed: bool,
    sent: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recording {
    fn new(name: &str, succeed: bool) -> Self {
        Self {
            name: name.to_string(),
            succeed,
            sent: Arc::default(),
        }
    }

    fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Channel for Recording {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_notification(&self, message: &Value, event_type: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((event_type.to_string(), message.clone()));
        self.succeed
    }
}

#[test]
fn test_handle_delivers_to_routed_channels() {
    let config: NotifierConfig = serde_yaml_ng::from_str(
        r#"
notifications:
  default_channels: [primary, backup, pager]
"#,
    )
    .unwrap();
    let primary = Recording::new("primary", true);
    let backup = Recording::new("backup", false);

    let mut channels = ChannelRegistry::new();
    channels.register(primary.clone());
    channels.register(backup.clone());
    let notifier = Notifier::new(EventManager::new(&config), channels);

    let outcomes = notifier.handle(&HookContext::from_value(json!({ "hook_event": "Stop" })));
    assert_eq!(outcomes.len(), 1);

    let report = &outcomes[0].report;
    assert_eq!(report.event_id, "task_completion");
    assert_eq!(report.delivered, vec!["primary"]);
    assert_eq!(report.failed, vec!["backup"]);
    assert_eq!(report.missing, vec!["pager"]);
    assert!(!report.all_delivered());

    let sent = primary.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "task_completion");
    assert_eq!(sent[0].1["title"], json!("Task completed"));
    assert_eq!(backup.sent().len(), 1);
}

#[test]
fn test_nothing_fired_sends_nothing() {
    let recorder = Recording::new("primary", true);
    let mut channels = ChannelRegistry::new();
    channels.register(recorder.clone());
    let config: NotifierConfig =
        serde_yaml_ng::from_str("notifications:\n  default_channels: [primary]\n").unwrap();
    let notifier = Notifier::new(EventManager::new(&config), channels);

    assert!(notifier
        .handle(&HookContext::from_value(json!({ "tool_name": "Read" })))
        .is_empty());
    assert!(recorder.sent().is_empty());
}

#[test]
fn test_from_config_uses_custom_template_dir() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("task_completion_default.yaml"),
        "title: \"Done in $project\"\ncontent: \"Session ${session_id} finished\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("broken.yaml"), "title: [unclosed\n").unwrap();

    let yaml = format!(
        "notifications:\n  default_channels: [chat]\ntemplates:\n  custom_dir: {}\n",
        dir.path().display()
    );
    let config = ConfigLoader::load_from_str(&yaml).unwrap();

    let recorder = Recording::new("chat", true);
    let mut notifier = Notifier::from_config(&config).unwrap();
    notifier.channels_mut().register(recorder.clone());

    let outcomes = notifier.handle(&HookContext::from_value(json!({
        "hook_event": "Stop",
        "project": "docs",
        "session_id": "abc123"
    })));
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].report.all_delivered());

    let message = &recorder.sent()[0].1;
    assert_eq!(message["title"], json!("Done in docs"));
    assert_eq!(message["content"], json!("Session abc123 finished"));
}

#[test]
fn test_missing_template_dir_is_not_fatal() {
    let config = ConfigLoader::load_from_str(
        "templates:\n  custom_dir: /definitely/not/here\nnotifications:\n  default_channels: [log]\n",
    )
    .unwrap();
    let mut notifier = Notifier::from_config(&config).unwrap();
    notifier.channels_mut().register(LogChannel::new("log"));

    let outcomes = notifier.handle(&HookContext::from_value(json!({ "error_message": "boom" })));
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].report.delivered, vec!["log"]);
    assert!(outcomes[0].event.rendered.is_some());
}

#[test]
fn test_runtime_channel_override_wins() {
    let config: NotifierConfig =
        serde_yaml_ng::from_str("notifications:\n  default_channels: [a]\n").unwrap();
    let a = Recording::new("a", true);
    let b = Recording::new("b", true);
    let mut channels = ChannelRegistry::new();
    channels.register(a.clone());
    channels.register(b.clone());

    let mut notifier = Notifier::new(EventManager::new(&config), channels);
    notifier
        .manager_mut()
        .set_event_channels("task_completion", vec!["b".to_string()]);

    notifier.handle(&HookContext::from_value(json!({ "task_status": "completed" })));
    assert!(a.sent().is_empty());
    assert_eq!(b.sent().len(), 1);
}
