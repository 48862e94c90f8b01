use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration consumed by the event manager
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Per-event settings for built-in and custom events (`events.<id>`)
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: BTreeMap<String, EventSettings>,

    /// Raw custom event specs (`custom_events.<id>`), in file order
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_events: serde_json::Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub notifications: NotificationSettings,

    /// Channel name -> provider settings (opaque to the core)
    #[serde(default, deserialize_with = "null_as_default")]
    pub channels: BTreeMap<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub templates: TemplateSettings,
}

impl NotifierConfig {
    /// Settings for one event id, if configured
    pub fn event_settings(&self, event_id: &str) -> Option<&EventSettings> {
        self.events.get(event_id)
    }

    /// Channels declared in `channels` that are not explicitly disabled
    pub fn enabled_channels(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, settings)| {
                settings
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .unwrap_or(true)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Settings for a single event (`events.<id>`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,

    /// Template id override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<EventConditions>,

    /// Extra signatures for `sensitive_operation`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// Cooldown and frequency limits for an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConditions {
    /// Minimum seconds between two fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,

    /// Maximum fires within `time_window`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frequency: Option<u32>,

    /// Sliding window in seconds for `max_frequency`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<u64>,
}

pub const DEFAULT_TIME_WINDOW_SECS: u64 = 60;

impl EventConditions {
    pub fn with_cooldown(mut self, seconds: u64) -> Self {
        self.cooldown = Some(seconds);
        self
    }

    pub fn with_max_frequency(mut self, max: u32, time_window: u64) -> Self {
        self.max_frequency = Some(max);
        self.time_window = Some(time_window);
        self
    }

    pub fn cooldown_duration(&self) -> Option<chrono::Duration> {
        self.cooldown
            .filter(|secs| *secs > 0)
            .map(saturating_seconds)
    }

    pub fn window_duration(&self) -> chrono::Duration {
        saturating_seconds(self.time_window.unwrap_or(DEFAULT_TIME_WINDOW_SECS))
    }

    pub fn is_empty(&self) -> bool {
        self.cooldown_duration().is_none() && self.max_frequency.is_none()
    }
}

/// Seconds as a duration, clamped to `Duration::MAX` when out of range
fn saturating_seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Manager-level notification settings (`notifications`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_channels: Vec<String>,

    /// Global cap across all events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiting: Option<RateLimitSettings>,

    #[serde(default)]
    pub work_hours: WorkHours,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_per_minute: default_max_per_minute(),
        }
    }
}

/// Local-time window used by the time-based trigger functions
///
/// `start_hour > end_hour` describes a window that wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHours {
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,

    /// Exclusive
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,

    #[serde(default = "default_true")]
    pub weekdays_only: bool,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            weekdays_only: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Directory of user `*.yaml` templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_per_minute() -> u32 {
    10
}

fn default_start_hour() -> u32 {
    9
}

fn default_end_hour() -> u32 {
    18
}

/// Treats an explicit `null` (an empty YAML key) like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_default_is_empty() {
        let config = NotifierConfig::default();
        assert!(config.events.is_empty());
        assert!(config.custom_events.is_empty());
        assert!(config.notifications.default_channels.is_empty());
        assert_eq!(config.notifications.work_hours, WorkHours::default());
    }

    #[test]
    fn test_empty_sections_deserialize_as_defaults() {
        let yaml = "events:\ncustom_events:\nnotifications:\n  default_channels:\n";
        let config: NotifierConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(config.events.is_empty());
        assert!(config.custom_events.is_empty());
        assert!(config.notifications.default_channels.is_empty());
    }

    #[test]
    fn test_enabled_channels_skips_disabled() {
        let yaml = r#"
channels:
  dingtalk:
    enabled: true
    webhook: https://example.invalid/hook
  email:
    enabled: false
  telegram:
    token: abc
"#;
        let config: NotifierConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.enabled_channels(), vec!["dingtalk", "telegram"]);
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let huge = EventConditions::default()
            .with_cooldown(100_000_000_000_000_000)
            .with_max_frequency(5, u64::MAX);
        assert_eq!(huge.cooldown_duration(), Some(chrono::Duration::MAX));
        assert_eq!(huge.window_duration(), chrono::Duration::MAX);
    }

    #[test]
    fn test_event_conditions_durations() {
        let conditions = EventConditions::default()
            .with_cooldown(30)
            .with_max_frequency(3, 600);
        assert_eq!(conditions.cooldown_duration(), Some(chrono::Duration::seconds(30)));
        assert_eq!(conditions.window_duration(), chrono::Duration::seconds(600));
        assert!(!conditions.is_empty());

        let zero = EventConditions::default().with_cooldown(0);
        assert!(zero.cooldown_duration().is_none());
        assert!(zero.is_empty());
        assert_eq!(zero.window_duration(), chrono::Duration::seconds(60));
    }
}
