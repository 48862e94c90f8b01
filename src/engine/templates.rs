use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use super::context::coerce_to_string;
use super::events::builtin::BUILTIN_EVENT_IDS;
use super::events::custom::CUSTOM_EVENT_TEMPLATE;
use super::events::EventData;
use crate::Result;

/// Renders a template id with event data into a channel-agnostic message
pub trait TemplateRenderer: Send + Sync {
    /// `None` when the template id is unknown
    fn render(&self, template_id: &str, data: &EventData) -> Option<Value>;

    /// Render a template carried inline by an event
    fn render_inline(&self, template: &Value, data: &EventData) -> Value {
        substitute(template, data)
    }
}

/// `$$`, `${name}` or `$name`
static PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").ok()
});

/// Substitute placeholders in every string of `template`, recursing into
/// maps and lists. Unknown placeholders are left as written.
pub fn substitute(template: &Value, data: &EventData) -> Value {
    match template {
        Value::String(text) => Value::String(substitute_str(text, data)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(text: &str, data: &EventData) -> String {
    let Some(placeholder) = PLACEHOLDER.as_ref() else {
        return text.to_string();
    };
    placeholder
        .replace_all(text, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match data.get(name) {
                Some(Value::Null) => String::new(),
                Some(value) => coerce_to_string(value).unwrap_or_else(|| value.to_string()),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// In-memory template store keyed by template id
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Value>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with a default template per built-in event
    pub fn with_builtin_templates() -> Self {
        let mut store = Self::new();
        for id in BUILTIN_EVENT_IDS {
            store.insert(format!("{}_default", id), builtin_template(id));
        }
        store.insert(
            CUSTOM_EVENT_TEMPLATE,
            json!({
                "title": "$event_name",
                "content": "Project: $project\nTime: $timestamp",
            }),
        );
        store
    }

    /// Insert or replace a template
    pub fn insert(&mut self, id: impl Into<String>, template: Value) {
        self.templates.insert(id.into(), template);
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.templates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Load every `*.yaml` / `*.yml` file in `dir`; the file stem is the id.
    ///
    /// Unparseable files are skipped with a warning. Returns how many loaded.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        paths.sort();

        for path in paths {
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let parsed = std::fs::read_to_string(&path)
                .map_err(crate::NotifierError::from)
                .and_then(|contents| {
                    serde_yaml_ng::from_str::<Value>(&contents).map_err(Into::into)
                });
            match parsed {
                Ok(template) => {
                    debug!("Loaded template '{}' from {}", id, path.display());
                    self.insert(id, template);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping template {}: {}", path.display(), e),
            }
        }

        Ok(loaded)
    }
}

impl TemplateRenderer for TemplateStore {
    fn render(&self, template_id: &str, data: &EventData) -> Option<Value> {
        self.get(template_id).map(|template| substitute(template, data))
    }
}

fn builtin_template(event_id: &str) -> Value {
    let (title, content) = match event_id {
        "sensitive_operation" => (
            "Sensitive operation detected",
            "Project: $project\nOperation: $operation\nRisk: $risk_level\nTime: $timestamp",
        ),
        "task_completion" => (
            "Task completed",
            "Project: $project\nStatus: $status\nTime: $timestamp",
        ),
        "rate_limit" => (
            "Rate limit reached",
            "Project: $project\nMessage: $error_message\nReset: $reset_time",
        ),
        "error_occurred" => (
            "Error occurred",
            "Project: $project\nTool: $tool_name\nError: $error_message\nTime: $timestamp",
        ),
        "session_start" => (
            "Session started",
            "Project: $project\nSession: $session_id\nTime: $timestamp",
        ),
        "confirmation_required" => (
            "Confirmation required",
            "Project: $project\nOperation: $operation\nTime: $timestamp",
        ),
        "idle_prompt" => ("Waiting for input", "Project: $project\n$message"),
        _ => ("$title", "Project: $project\nTime: $timestamp"),
    };
    json!({ "title": title, "content": content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn data(pairs: &[(&str, Value)]) -> EventData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitute_recursive() {
        let template = json!({
            "title": "Alert for $project",
            "lines": ["${operation}!", "count=$count", 7],
            "nested": { "cost": "$$5 at $timestamp" }
        });
        let rendered = substitute(
            &template,
            &data(&[
                ("project", json!("app")),
                ("operation", json!("rm -rf")),
                ("count", json!(3)),
            ]),
        );
        assert_eq!(
            rendered,
            json!({
                "title": "Alert for app",
                "lines": ["rm -rf!", "count=3", 7],
                "nested": { "cost": "$5 at $timestamp" }
            })
        );
    }

    #[test]
    fn test_builtin_templates_exist() {
        let store = TemplateStore::with_builtin_templates();
        for id in BUILTIN_EVENT_IDS {
            assert!(store.contains(&format!("{id}_default")), "{id}");
        }
        assert!(store.contains(CUSTOM_EVENT_TEMPLATE));

        let rendered = store
            .render(
                "task_completion_default",
                &data(&[
                    ("project", json!("demo")),
                    ("status", json!("completed")),
                    ("timestamp", json!("2024-05-01 12:00:00")),
                ]),
            )
            .unwrap();
        assert_eq!(
            rendered["content"],
            json!("Project: demo\nStatus: completed\nTime: 2024-05-01 12:00:00")
        );
        assert!(store.render("missing", &EventData::new()).is_none());
    }

    #[test]
    fn test_load_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("deploy.yaml"), "title: Deploy $project\n").unwrap();
        fs::write(dir.path().join("broken.yml"), "title: [unclosed\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = TemplateStore::new();
        assert_eq!(store.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(store.ids(), vec!["deploy"]);
        assert_eq!(
            store.render("deploy", &data(&[("project", json!("x"))])),
            Some(json!({ "title": "Deploy x" }))
        );
    }

    #[test]
    fn test_load_dir_missing_is_error() {
        let mut store = TemplateStore::new();
        assert!(store.load_dir("/nonexistent/templates").is_err());
    }
}
