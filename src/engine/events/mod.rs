//! Notification events: the shared contract, priorities and event data

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::conditions::ConditionResult;
use super::context::HookContext;
use crate::config::EventConditions;

pub mod builtin;
pub mod custom;

pub use builtin::{
    default_events, default_events_with_signatures, sensitive_signatures, RiskLevel,
    SensitivePattern, SensitivePatternSet,
};
pub use custom::CustomEvent;

/// Data extracted from a context for rendering
pub type EventData = serde_json::Map<String, Value>;

/// Notification priority, ordered `low < normal < high < critical`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    /// Unknown or non-string priorities fall back to `normal`
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let parsed = raw.as_str().map(str::parse::<Priority>);
        Ok(match parsed {
            Some(Ok(priority)) => priority,
            Some(Err(e)) => {
                warn!("{}, using normal", e);
                Priority::Normal
            }
            None => {
                if !raw.is_null() {
                    warn!("Priority must be a string, got {}; using normal", raw);
                }
                Priority::Normal
            }
        })
    }
}

/// Built-in events are fixed at startup, custom events come from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Builtin,
    Custom,
}

/// Contract shared by built-in and custom events
pub trait NotificationEvent: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Human readable name
    fn name(&self) -> &str;

    fn priority(&self) -> Priority;

    fn kind(&self) -> EventKind;

    /// Enabled state before any configuration override
    fn default_enabled(&self) -> bool {
        true
    }

    /// Cooldown / frequency limits declared by the event itself
    fn conditions(&self) -> Option<&EventConditions> {
        None
    }

    /// Channels declared by the event itself
    fn channels(&self) -> Option<&[String]> {
        None
    }

    /// Template id used for rendering
    fn template(&self) -> String {
        format!("{}_default", self.id())
    }

    /// Template carried inline by the event, rendered instead of `template()`
    fn inline_template(&self) -> Option<&Value> {
        None
    }

    /// Evaluate the event against a context
    fn check(&self, ctx: &HookContext) -> ConditionResult;

    fn should_trigger(&self, ctx: &HookContext) -> bool {
        self.check(ctx).is_match()
    }

    /// Data for rendering; never fails, every key has a default
    fn extract_data(&self, ctx: &HookContext) -> EventData;
}

/// Keys every event carries
pub(crate) fn base_data(ctx: &HookContext, title: &str) -> EventData {
    let mut data = EventData::new();
    data.insert("title".into(), Value::String(title.to_string()));
    data.insert("project".into(), Value::String(ctx.project_name()));
    data.insert("timestamp".into(), Value::String(ctx.formatted_timestamp()));
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_lenient_deserialize() {
        let high: Priority = serde_json::from_value(serde_json::json!("HIGH")).unwrap();
        let unknown: Priority = serde_json::from_value(serde_json::json!("urgent")).unwrap();
        let number: Priority = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(high, Priority::High);
        assert_eq!(unknown, Priority::Normal);
        assert_eq!(number, Priority::Normal);
    }

    #[test]
    fn test_priority_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), serde_json::json!("critical"));
        assert_eq!(Priority::Low.to_string(), "low");
    }
}
