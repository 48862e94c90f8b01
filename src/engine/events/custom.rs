//! User-declared events built from `custom_events` configuration

use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{EventData, EventKind, NotificationEvent, Priority};
use crate::config::{CaptureGroup, CustomEventSpec, EventConditions, ExtractorSpec, StructuredExtractor};
use crate::engine::conditions::{build_regex, evaluate_all, ConditionResult, Trigger};
use crate::engine::context::HookContext;
use crate::engine::functions::{shared_builtin, FunctionRegistry};
use crate::{NotifierError, Result};

pub const CUSTOM_EVENT_TEMPLATE: &str = "custom_event_default";

/// A compiled data extractor
#[derive(Debug, Clone)]
enum Extractor {
    Field {
        field: String,
        default: Value,
    },
    Regex {
        field: String,
        regex: Regex,
        group: Option<CaptureGroup>,
        default: Value,
    },
    Function {
        name: String,
        default: Value,
    },
    /// Malformed in configuration; always yields its default
    Invalid {
        default: Value,
    },
}

impl Extractor {
    fn compile(event_id: &str, key: &str, raw: &Value) -> Self {
        let declared_default = raw.get("default").cloned().unwrap_or_else(empty);

        let spec: ExtractorSpec = match serde_json::from_value(raw.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("Custom event '{}': invalid extractor '{}': {}", event_id, key, e);
                return Extractor::Invalid {
                    default: declared_default,
                };
            }
        };

        match spec {
            ExtractorSpec::Field(field) => Extractor::Field {
                field,
                default: empty(),
            },
            ExtractorSpec::Structured(StructuredExtractor::Field { field, default }) => {
                Extractor::Field {
                    field,
                    default: default.unwrap_or_else(empty),
                }
            }
            ExtractorSpec::Structured(StructuredExtractor::Function { function, default }) => {
                Extractor::Function {
                    name: function,
                    default: default.unwrap_or_else(empty),
                }
            }
            ExtractorSpec::Structured(StructuredExtractor::Regex {
                field,
                pattern,
                group,
                flags,
                default,
            }) => {
                let default = default.unwrap_or_else(empty);
                match build_regex(&pattern, &flags) {
                    Ok(regex) => Extractor::Regex {
                        field,
                        regex,
                        group,
                        default,
                    },
                    Err(e) => {
                        warn!(
                            "Custom event '{}': extractor '{}' has invalid regex: {}",
                            event_id, key, e
                        );
                        Extractor::Invalid { default }
                    }
                }
            }
        }
    }

    fn extract(&self, ctx: &HookContext, functions: &FunctionRegistry) -> Value {
        match self {
            Extractor::Field { field, default } => ctx
                .get(field)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| default.clone()),
            Extractor::Regex {
                field,
                regex,
                group,
                default,
            } => ctx
                .get_str(field)
                .and_then(|text| capture(regex, group.as_ref(), &text))
                .map(Value::String)
                .unwrap_or_else(|| default.clone()),
            Extractor::Function { name, default } => match functions.call_extractor(name, ctx) {
                Some(Some(value)) => value,
                Some(None) => default.clone(),
                None => {
                    warn!("Unknown extractor function '{}'", name);
                    default.clone()
                }
            },
            Extractor::Invalid { default } => default.clone(),
        }
    }
}

/// Group 1 when the pattern has groups and none was named, else the whole match
fn capture(regex: &Regex, group: Option<&CaptureGroup>, text: &str) -> Option<String> {
    let captures = regex.captures(text)?;
    let matched = match group {
        Some(CaptureGroup::Index(index)) => captures.get(*index),
        Some(CaptureGroup::Name(name)) => captures.name(name),
        None if regex.captures_len() > 1 => captures.get(1),
        None => captures.get(0),
    };
    matched.map(|m| m.as_str().to_string())
}

fn empty() -> Value {
    Value::String(String::new())
}

/// Event defined declaratively in configuration
#[derive(Debug, Clone)]
pub struct CustomEvent {
    id: String,
    name: String,
    description: Option<String>,
    priority: Priority,
    triggers: Vec<Trigger>,
    conditions: Option<EventConditions>,
    extractors: Vec<(String, Extractor)>,
    channels: Option<Vec<String>>,
    template: Option<String>,
    inline_template: Option<Value>,
    enabled: bool,
    functions: Arc<FunctionRegistry>,
}

impl CustomEvent {
    /// Compile a spec against the built-in function registry
    pub fn new(id: impl Into<String>, spec: &CustomEventSpec) -> Result<Self> {
        Self::with_functions(id, spec, shared_builtin())
    }

    /// Compile a spec; fails when a trigger regex does not compile
    pub fn with_functions(
        id: impl Into<String>,
        spec: &CustomEventSpec,
        functions: Arc<FunctionRegistry>,
    ) -> Result<Self> {
        let id = id.into();

        let triggers = spec
            .triggers
            .iter()
            .enumerate()
            .map(|(index, trigger)| {
                Trigger::compile(trigger).map_err(|e| {
                    NotifierError::invalid_event(&id, format!("trigger {}: {}", index + 1, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extractors = spec
            .data_extractors
            .iter()
            .map(|(key, raw)| (key.clone(), Extractor::compile(&id, key, raw)))
            .collect();

        let (template, inline_template) = match &spec.message_template {
            None => (None, None),
            Some(Value::String(template_id)) => (Some(template_id.clone()), None),
            Some(inline @ Value::Object(_)) => (None, Some(inline.clone())),
            Some(other) => {
                warn!("Custom event '{}': ignoring message_template {}", id, other);
                (None, None)
            }
        };

        let name = if spec.name.trim().is_empty() {
            id.clone()
        } else {
            spec.name.clone()
        };

        debug!(
            "Compiled custom event '{}' ({} triggers, {} extractors)",
            id,
            triggers.len(),
            spec.data_extractors.len()
        );

        Ok(Self {
            id,
            name,
            description: spec.description.clone(),
            priority: spec.priority,
            triggers,
            conditions: spec.conditions.clone(),
            extractors,
            channels: spec.channels.clone(),
            template,
            inline_template,
            enabled: spec.enabled,
            functions,
        })
    }

    /// Parse a raw configuration value and compile it
    pub fn from_value(id: impl Into<String>, raw: &Value) -> Result<Self> {
        let id = id.into();
        let spec: CustomEventSpec = serde_json::from_value(raw.clone())
            .map_err(|e| NotifierError::invalid_event(&id, e.to_string()))?;
        Self::new(id, &spec)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

impl NotificationEvent for CustomEvent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn kind(&self) -> EventKind {
        EventKind::Custom
    }

    fn default_enabled(&self) -> bool {
        self.enabled
    }

    fn conditions(&self) -> Option<&EventConditions> {
        self.conditions.as_ref()
    }

    fn channels(&self) -> Option<&[String]> {
        self.channels.as_deref()
    }

    fn template(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| CUSTOM_EVENT_TEMPLATE.to_string())
    }

    fn inline_template(&self) -> Option<&Value> {
        self.inline_template.as_ref()
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        evaluate_all(&self.triggers, ctx, &self.functions)
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = EventData::new();
        data.insert("event_name".into(), Value::String(self.name.clone()));
        data.insert("project".into(), Value::String(ctx.project_name()));
        data.insert("timestamp".into(), Value::String(ctx.formatted_timestamp()));

        for (key, extractor) in &self.extractors {
            data.insert(key.clone(), extractor.extract(ctx, &self.functions));
        }
        data
    }
}
