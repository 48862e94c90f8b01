//! Named functions available to `function` triggers and extractors
//!
//! Configuration can only reference functions by name; the registries map
//! those names to plain Rust functions. Nothing is resolved dynamically.

use chrono::{Datelike, Timelike, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::HookContext;
use super::events::builtin::{default_signatures, SensitivePatternSet};
use crate::config::WorkHours;

/// Environment handed to trigger functions
#[derive(Debug, Clone)]
pub struct FunctionEnv {
    pub work_hours: WorkHours,
    /// Same set the `sensitive_operation` event matches against
    pub signatures: Arc<SensitivePatternSet>,
}

impl Default for FunctionEnv {
    fn default() -> Self {
        Self {
            work_hours: WorkHours::default(),
            signatures: default_signatures(),
        }
    }
}

pub type TriggerFn = fn(&HookContext, &FunctionEnv) -> bool;
pub type ExtractorFn = fn(&HookContext) -> Option<Value>;

/// Name -> function lookup for triggers and extractors
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    triggers: BTreeMap<String, TriggerFn>,
    extractors: BTreeMap<String, ExtractorFn>,
    env: FunctionEnv,
}

static SHARED_BUILTIN: Lazy<Arc<FunctionRegistry>> =
    Lazy::new(|| Arc::new(FunctionRegistry::builtin()));

/// Built-in registry with default work hours, shared across events
pub fn shared_builtin() -> Arc<FunctionRegistry> {
    Arc::clone(&SHARED_BUILTIN)
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FunctionRegistry {
    /// Registry with no functions at all
    pub fn empty() -> Self {
        Self {
            triggers: BTreeMap::new(),
            extractors: BTreeMap::new(),
            env: FunctionEnv::default(),
        }
    }

    /// Registry preloaded with the built-in functions
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.register_trigger("has_error_keywords", has_error_keywords);
        registry.register_trigger("is_work_hours", is_work_hours);
        registry.register_trigger("is_outside_work_hours", is_outside_work_hours);
        registry.register_trigger("is_weekend", is_weekend);
        registry.register_trigger("is_sensitive_command", is_sensitive_command);
        registry.register_trigger("is_git_operation", is_git_operation);
        registry.register_trigger("is_production_project", is_production_project);
        registry.register_trigger("is_long_running", is_long_running);
        registry.register_trigger("has_tool_error", has_tool_error);

        registry.register_extractor("get_project_name", get_project_name);
        registry.register_extractor("get_current_time", get_current_time);
        registry.register_extractor("get_day_of_week", get_day_of_week);
        registry.register_extractor("get_timestamp", get_timestamp);
        registry.register_extractor("get_command", get_command);
        registry.register_extractor("get_file_path", get_file_path);
        registry.register_extractor("get_tool_name", get_tool_name);
        registry.register_extractor("get_session_id", get_session_id);
        registry.register_extractor("get_hook_event", get_hook_event);
        registry.register_extractor("get_error_summary", get_error_summary);

        registry
    }

    pub fn with_work_hours(mut self, work_hours: WorkHours) -> Self {
        self.env.work_hours = work_hours;
        self
    }

    pub fn with_sensitive_signatures(mut self, signatures: Arc<SensitivePatternSet>) -> Self {
        self.env.signatures = signatures;
        self
    }

    pub fn env(&self) -> &FunctionEnv {
        &self.env
    }

    /// Register or replace a trigger function
    pub fn register_trigger(&mut self, name: impl Into<String>, function: TriggerFn) {
        self.triggers.insert(name.into(), function);
    }

    /// Register or replace an extractor function
    pub fn register_extractor(&mut self, name: impl Into<String>, function: ExtractorFn) {
        self.extractors.insert(name.into(), function);
    }

    /// `None` when no trigger function has that name
    pub fn call_trigger(&self, name: &str, ctx: &HookContext) -> Option<bool> {
        self.triggers.get(name).map(|f| f(ctx, &self.env))
    }

    /// Outer `None` when unknown, inner `None` when the function had nothing to return
    pub fn call_extractor(&self, name: &str, ctx: &HookContext) -> Option<Option<Value>> {
        self.extractors.get(name).map(|f| f(ctx))
    }

    pub fn has_trigger(&self, name: &str) -> bool {
        self.triggers.contains_key(name)
    }

    pub fn has_extractor(&self, name: &str) -> bool {
        self.extractors.contains_key(name)
    }

    pub fn trigger_names(&self) -> Vec<&str> {
        self.triggers.keys().map(String::as_str).collect()
    }

    pub fn extractor_names(&self) -> Vec<&str> {
        self.extractors.keys().map(String::as_str).collect()
    }
}

// Trigger functions

const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "failure",
    "exception",
    "traceback",
    "fatal",
    "panic",
];

static GIT_OPERATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\bgit\s+(commit|push|pull|merge|rebase|reset|checkout|tag)\b").ok()
});

/// Textual fields scanned for error keywords
const KEYWORD_FIELDS: &[&str] = &["tool_input", "error_message", "message", "output"];

fn has_error_keywords(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    KEYWORD_FIELDS.iter().any(|field| {
        ctx.get_str(field).is_some_and(|text| {
            let text = text.to_lowercase();
            ERROR_KEYWORDS.iter().any(|keyword| text.contains(keyword))
        })
    })
}

fn is_work_hours(ctx: &HookContext, env: &FunctionEnv) -> bool {
    let local = ctx.local_time();
    let hours = &env.work_hours;
    if hours.weekdays_only && is_weekend_day(local.weekday()) {
        return false;
    }
    let hour = local.hour();
    if hours.start_hour <= hours.end_hour {
        (hours.start_hour..hours.end_hour).contains(&hour)
    } else {
        // overnight shift, e.g. 22 -> 6
        hour >= hours.start_hour || hour < hours.end_hour
    }
}

fn is_outside_work_hours(ctx: &HookContext, env: &FunctionEnv) -> bool {
    !is_work_hours(ctx, env)
}

fn is_weekend(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    is_weekend_day(ctx.local_time().weekday())
}

fn is_sensitive_command(ctx: &HookContext, env: &FunctionEnv) -> bool {
    ctx.command_text()
        .is_some_and(|command| env.signatures.first_match(&command).is_some())
}

fn is_git_operation(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    match (GIT_OPERATION.as_ref(), ctx.command_text()) {
        (Some(regex), Some(command)) => regex.is_match(&command),
        _ => false,
    }
}

fn is_production_project(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    let project = ctx.project_name().to_lowercase();
    project.contains("prod") || project.contains("live")
}

/// Seconds after which a task counts as long-running
const LONG_RUNNING_SECS: f64 = 300.0;

fn is_long_running(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    ctx.get_f64("duration")
        .or_else(|| ctx.get_f64("duration_ms").map(|ms| ms / 1000.0))
        .is_some_and(|secs| secs >= LONG_RUNNING_SECS)
}

fn has_tool_error(ctx: &HookContext, _env: &FunctionEnv) -> bool {
    ctx.get_bool("has_error").unwrap_or(false)
}

fn is_weekend_day(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

// Extractor functions

fn get_project_name(ctx: &HookContext) -> Option<Value> {
    Some(Value::String(ctx.project_name()))
}

fn get_current_time(ctx: &HookContext) -> Option<Value> {
    Some(Value::String(ctx.formatted_timestamp()))
}

fn get_day_of_week(ctx: &HookContext) -> Option<Value> {
    Some(Value::String(ctx.local_time().format("%A").to_string()))
}

fn get_timestamp(ctx: &HookContext) -> Option<Value> {
    Some(Value::String(ctx.timestamp().to_rfc3339()))
}

fn get_command(ctx: &HookContext) -> Option<Value> {
    ctx.command_text().map(Value::String)
}

fn get_file_path(ctx: &HookContext) -> Option<Value> {
    ctx.get_str("file_path")
        .or_else(|| ctx.get_str("tool_input.file_path"))
        .map(Value::String)
}

fn get_tool_name(ctx: &HookContext) -> Option<Value> {
    ctx.get_str("tool_name").map(Value::String)
}

fn get_session_id(ctx: &HookContext) -> Option<Value> {
    ctx.get_str("session_id").map(Value::String)
}

fn get_hook_event(ctx: &HookContext) -> Option<Value> {
    ctx.get_str("hook_event").map(Value::String)
}

fn get_error_summary(ctx: &HookContext) -> Option<Value> {
    let message = ctx.get_str("error_message")?;
    let first_line = message.lines().next().unwrap_or_default();
    Some(Value::String(first_line.chars().take(100).collect()))
}
