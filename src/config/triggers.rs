use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::types::EventConditions;
use crate::engine::events::Priority;

/// Trigger predicate as declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Regex search on a context field
    /// Example: { type: pattern, field: tool_input, pattern: "git\\s+push", flags: [i] }
    Pattern {
        #[serde(default = "default_field")]
        field: String,
        pattern: String,
        #[serde(default, deserialize_with = "string_or_list")]
        flags: Vec<String>,
        #[serde(default)]
        negate: bool,
    },

    /// Operator comparison on a context field
    /// Example: { type: condition, field: project, operator: contains, value: prod }
    Condition {
        field: String,
        #[serde(default = "default_operator")]
        operator: String,
        #[serde(default)]
        value: Option<Value>,
        #[serde(default)]
        negate: bool,
    },

    /// Named predicate from the trigger function registry
    /// Example: { type: function, function: is_work_hours, negate: true }
    Function {
        function: String,
        #[serde(default)]
        negate: bool,
    },
}

/// Data extractor as declared in configuration.
///
/// A bare string copies the named context field; the structured forms are
/// tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractorSpec {
    Field(String),
    Structured(StructuredExtractor),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredExtractor {
    Regex {
        #[serde(default = "default_field")]
        field: String,
        pattern: String,
        #[serde(default)]
        group: Option<CaptureGroup>,
        #[serde(default, deserialize_with = "string_or_list")]
        flags: Vec<String>,
        #[serde(default)]
        default: Option<Value>,
    },
    Field {
        field: String,
        #[serde(default)]
        default: Option<Value>,
    },
    Function {
        function: String,
        #[serde(default)]
        default: Option<Value>,
    },
}

/// Capture group reference for regex extractors (index or name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureGroup {
    Index(usize),
    Name(String),
}

/// Declarative definition of a custom event (`custom_events.<id>`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEventSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// AND-combined; an empty list never fires
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<EventConditions>,

    /// Target key -> extractor. Kept raw so one malformed extractor only
    /// degrades itself.
    #[serde(default)]
    pub data_extractors: serde_json::Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,

    /// Template id (string) or an inline template (map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<Value>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl CustomEventSpec {
    /// Minimal definition with a name and triggers; everything else defaulted
    pub fn new(name: impl Into<String>, triggers: Vec<TriggerSpec>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority: Priority::Normal,
            triggers,
            conditions: None,
            data_extractors: serde_json::Map::new(),
            channels: None,
            message_template: None,
            enabled: true,
        }
    }
}

fn default_field() -> String {
    "tool_input".to_string()
}

fn default_operator() -> String {
    "equals".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Accepts `flags: i`, `flags: "i,m"` or `flags: [i, m]`
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split([',', '|'])
            .map(str::trim)
            .filter(|flag| !flag.is_empty())
            .map(str::to_string)
            .collect(),
        Some(OneOrMany::Many(flags)) => flags,
    })
}
