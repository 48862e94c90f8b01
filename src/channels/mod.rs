//! Delivery channels and dispatch of triggered events

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::engine::TriggeredEvent;

/// A notification sink (DingTalk, Feishu, Telegram, email, ...)
///
/// Senders live outside this crate; the core only needs a name and a single
/// delivery attempt that reports success.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// One delivery attempt; `false` on failure
    fn send_notification(&self, message: &Value, event_type: &str) -> bool;
}

/// Outcome of dispatching one triggered event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event_id: String,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    /// Routed to, but not registered
    pub missing: Vec<String>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }
}

/// Registered channels by name
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Box<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own name, replacing any previous one
    pub fn register(&mut self, channel: impl Channel + 'static) {
        let name = channel.name().to_string();
        debug!("Registered channel '{}'", name);
        self.channels.insert(name, Box::new(channel));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels.get(name).map(|channel| channel.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send an event to each of its channels once
    pub fn dispatch(&self, event: &TriggeredEvent) -> DispatchReport {
        let message = message_for(event);
        let mut report = DispatchReport {
            event_id: event.event_id.clone(),
            ..Default::default()
        };

        for name in &event.channels {
            match self.get(name) {
                None => {
                    warn!("Event '{}' routed to unknown channel '{}'", event.event_id, name);
                    report.missing.push(name.clone());
                }
                Some(channel) => {
                    if channel.send_notification(&message, &event.event_id) {
                        report.delivered.push(name.clone());
                    } else {
                        warn!("Channel '{}' failed to deliver '{}'", name, event.event_id);
                        report.failed.push(name.clone());
                    }
                }
            }
        }
        report
    }
}

/// Rendered message, or a minimal one built from the event data
pub fn message_for(event: &TriggeredEvent) -> Value {
    event.rendered.clone().unwrap_or_else(|| {
        json!({
            "title": event.event_name,
            "priority": event.priority,
            "data": event.data,
        })
    })
}

/// Channel that only writes the message to the log
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Channel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_notification(&self, message: &Value, event_type: &str) -> bool {
        info!(channel = %self.name, event = event_type, "{}", message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EventData, EventKind, Priority};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    struct Failing;

    impl Channel for Failing {
        fn name(&self) -> &str {
            "broken"
        }

        fn send_notification(&self, _message: &Value, _event_type: &str) -> bool {
            false
        }
    }

    fn triggered(channels: &[&str]) -> TriggeredEvent {
        TriggeredEvent {
            event_id: "task_completion".to_string(),
            event_name: "Task completion".to_string(),
            kind: EventKind::Builtin,
            priority: Priority::Normal,
            channels: channels.iter().map(|c| c.to_string()).collect(),
            data: EventData::new(),
            template: "task_completion_default".to_string(),
            rendered: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_dispatch_report() {
        let mut registry = ChannelRegistry::new();
        registry.register(LogChannel::new("log"));
        registry.register(Failing);
        assert_eq!(registry.names(), vec!["broken", "log"]);

        let report = registry.dispatch(&triggered(&["log", "broken", "pager"]));
        assert_eq!(
            report,
            DispatchReport {
                event_id: "task_completion".to_string(),
                delivered: vec!["log".to_string()],
                failed: vec!["broken".to_string()],
                missing: vec!["pager".to_string()],
            }
        );
        assert!(!report.all_delivered());
    }

    #[test]
    fn test_no_channels_is_trivially_delivered() {
        let registry = ChannelRegistry::new();
        let report = registry.dispatch(&triggered(&[]));
        assert!(report.all_delivered());
        assert!(report.delivered.is_empty());
    }

    #[test]
    fn test_fallback_message() {
        let message = message_for(&triggered(&[]));
        assert_eq!(message["title"], json!("Task completion"));
        assert_eq!(message["priority"], json!("normal"));
    }
}
