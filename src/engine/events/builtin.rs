//! Built-in events, in the order the manager evaluates them

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{base_data, EventData, EventKind, NotificationEvent, Priority};
use crate::config::NotifierConfig;
use crate::engine::conditions::ConditionResult;
use crate::engine::context::HookContext;

pub const SENSITIVE_OPERATION: &str = "sensitive_operation";
pub const TASK_COMPLETION: &str = "task_completion";
pub const RATE_LIMIT: &str = "rate_limit";
pub const ERROR_OCCURRED: &str = "error_occurred";
pub const SESSION_START: &str = "session_start";
pub const CONFIRMATION_REQUIRED: &str = "confirmation_required";
pub const IDLE_PROMPT: &str = "idle_prompt";

/// Built-in ids in evaluation order
pub const BUILTIN_EVENT_IDS: &[&str] = &[
    SENSITIVE_OPERATION,
    TASK_COMPLETION,
    RATE_LIMIT,
    ERROR_OCCURRED,
    SESSION_START,
    CONFIRMATION_REQUIRED,
    IDLE_PROMPT,
];

pub fn is_builtin_id(id: &str) -> bool {
    BUILTIN_EVENT_IDS.contains(&id)
}

/// Tools whose input is a shell command
const COMMAND_TOOLS: &[&str] = &["Bash"];

/// Construct all built-in events for a configuration
pub fn default_events(config: &NotifierConfig) -> Vec<Box<dyn NotificationEvent>> {
    default_events_with_signatures(sensitive_signatures(config))
}

/// Built-in events sharing an already built signature set
pub fn default_events_with_signatures(
    signatures: Arc<SensitivePatternSet>,
) -> Vec<Box<dyn NotificationEvent>> {
    vec![
        Box::new(SensitiveOperationEvent::with_signatures(signatures)),
        Box::new(TaskCompletionEvent),
        Box::new(RateLimitEvent),
        Box::new(ErrorOccurredEvent),
        Box::new(SessionStartEvent),
        Box::new(ConfirmationRequiredEvent),
        Box::new(IdlePromptEvent),
    ]
}

/// How dangerous a matched command is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        })
    }
}

/// A dangerous-command signature
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    pub name: String,
    pub pattern: String,
    pub risk: RiskLevel,
    regex: Regex,
}

impl SensitivePattern {
    /// Compile a case-insensitive signature
    pub fn new(name: impl Into<String>, pattern: &str, risk: RiskLevel) -> crate::Result<Self> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            name: name.into(),
            pattern: pattern.to_string(),
            risk,
            regex,
        })
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }
}

/// (name, pattern, risk), checked in order, most severe first
const DEFAULT_SIGNATURES: &[(&str, &str, RiskLevel)] = &[
    ("recursive_delete", r"\brm\s+(-\w+\s+)*-[a-z]*[rf]", RiskLevel::Critical),
    ("sql_drop", r"\b(drop\s+(table|database|schema)|truncate\s+table)\b", RiskLevel::Critical),
    ("disk_format", r"\b(mkfs(\.\w+)?|dd\s+if=)", RiskLevel::Critical),
    ("privilege_escalation", r"\bsudo\b", RiskLevel::High),
    ("world_writable", r"\bchmod\s+(-R\s+)?(777|a\+w)", RiskLevel::High),
    ("force_push", r"\bgit\s+push\b.*(--force\b|\s-f\b)", RiskLevel::High),
    ("history_rewrite", r"\bgit\s+(reset\s+--hard|clean\s+-[a-z]*f)", RiskLevel::High),
    ("package_publish", r"\b(npm|yarn|pnpm|cargo)\s+publish\b", RiskLevel::High),
    ("cluster_delete", r"\bkubectl\s+delete\b", RiskLevel::High),
    ("remote_script", r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z)?sh\b", RiskLevel::High),
    ("system_power", r"\b(shutdown|reboot|poweroff)\b", RiskLevel::High),
    ("container_removal", r"\b(docker|podman)\s+(rm|rmi|system\s+prune)\b", RiskLevel::Medium),
    ("recursive_chown", r"\bchown\s+-R\b", RiskLevel::Medium),
];

/// Ordered list of signatures; the first match wins
#[derive(Debug, Clone, Default)]
pub struct SensitivePatternSet {
    patterns: Vec<SensitivePattern>,
}

static DEFAULT_SET: Lazy<Arc<SensitivePatternSet>> =
    Lazy::new(|| Arc::new(SensitivePatternSet::builtin()));

/// The built-in signature set
pub fn default_signatures() -> Arc<SensitivePatternSet> {
    Arc::clone(&DEFAULT_SET)
}

/// Built-in signatures plus `events.sensitive_operation.patterns`
pub fn sensitive_signatures(config: &NotifierConfig) -> Arc<SensitivePatternSet> {
    let extra_patterns = config
        .event_settings(SENSITIVE_OPERATION)
        .map(|settings| settings.patterns.as_slice())
        .unwrap_or_default();
    if extra_patterns.is_empty() {
        return default_signatures();
    }
    let mut signatures = SensitivePatternSet::builtin();
    signatures.extend_from_config(extra_patterns);
    debug!("Sensitive operation signatures: {}", signatures.len());
    Arc::new(signatures)
}

impl SensitivePatternSet {
    pub fn builtin() -> Self {
        let patterns = DEFAULT_SIGNATURES
            .iter()
            .filter_map(|(name, pattern, risk)| {
                SensitivePattern::new(*name, pattern, *risk)
                    .map_err(|e| warn!("Skipping signature '{}': {}", name, e))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    /// Append a signature to the end of the list
    pub fn push(&mut self, pattern: SensitivePattern) {
        self.patterns.push(pattern);
    }

    /// Append user patterns from configuration; invalid ones are skipped
    pub fn extend_from_config(&mut self, patterns: &[String]) {
        for (index, pattern) in patterns.iter().enumerate() {
            match SensitivePattern::new(format!("custom_{}", index + 1), pattern, RiskLevel::High) {
                Ok(signature) => self.push(signature),
                Err(e) => warn!("Ignoring invalid sensitive pattern '{}': {}", pattern, e),
            }
        }
    }

    pub fn first_match(&self, command: &str) -> Option<&SensitivePattern> {
        self.patterns.iter().find(|p| p.is_match(command))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn hook_event_is(ctx: &HookContext, names: &[&str]) -> bool {
    ctx.get_str("hook_event")
        .is_some_and(|event| names.contains(&event.as_str()))
}

fn notification_type(ctx: &HookContext) -> Option<String> {
    ctx.get_str("notification_type")
        .or_else(|| ctx.get_str("type"))
}

fn text_or(ctx: &HookContext, field: &str, default: &str) -> Value {
    Value::String(
        ctx.get_str(field)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string()),
    )
}

/// A dangerous shell command is about to run
///
/// Matches when `tool_name` is `Bash` or missing entirely. Contexts built by
/// hand often carry only `tool_input`, so a missing tool name is treated as a
/// command rather than as "not a command".
#[derive(Debug, Clone)]
pub struct SensitiveOperationEvent {
    signatures: Arc<SensitivePatternSet>,
}

impl Default for SensitiveOperationEvent {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
        }
    }
}

impl SensitiveOperationEvent {
    pub fn with_signatures(signatures: Arc<SensitivePatternSet>) -> Self {
        Self { signatures }
    }

    fn matched_signature(&self, ctx: &HookContext) -> Option<&SensitivePattern> {
        let command_tool = match ctx.get_str("tool_name") {
            None => true,
            Some(tool) => COMMAND_TOOLS.contains(&tool.as_str()),
        };
        if !command_tool {
            return None;
        }
        let command = ctx.command_text()?;
        self.signatures.first_match(&command)
    }
}

impl NotificationEvent for SensitiveOperationEvent {
    fn id(&self) -> &str {
        SENSITIVE_OPERATION
    }

    fn name(&self) -> &str {
        "Sensitive operation"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        if self.matched_signature(ctx).is_some() {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Sensitive operation detected");
        let signature = self.matched_signature(ctx);
        data.insert(
            "operation".into(),
            Value::String(ctx.command_text().unwrap_or_default()),
        );
        data.insert(
            "risk_level".into(),
            Value::String(signature.map_or(RiskLevel::High, |s| s.risk).to_string()),
        );
        data.insert(
            "matched_pattern".into(),
            Value::String(signature.map(|s| s.name.clone()).unwrap_or_default()),
        );
        data.insert("tool_name".into(), text_or(ctx, "tool_name", "Bash"));
        data
    }
}

/// The assistant stopped or reported a completed task
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCompletionEvent;

impl NotificationEvent for TaskCompletionEvent {
    fn id(&self) -> &str {
        TASK_COMPLETION
    }

    fn name(&self) -> &str {
        "Task completion"
    }

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        let stopped = hook_event_is(ctx, &["Stop", "SubagentStop"]);
        let completed = ctx.get_str("task_status").as_deref() == Some("completed");
        if stopped || completed {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Task completed");
        data.insert("status".into(), text_or(ctx, "task_status", "completed"));
        data.insert("hook_event".into(), text_or(ctx, "hook_event", "Stop"));
        data.insert("summary".into(), text_or(ctx, "reason", "Task completed"));
        data.insert("session_id".into(), text_or(ctx, "session_id", "unknown"));
        data
    }
}

static RATE_LIMIT_SIGNATURE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)rate[\s_-]?limit|too many requests|\b429\b|quota exceeded|usage limit").ok()
});

/// The API reported a rate limit
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitEvent;

impl NotificationEvent for RateLimitEvent {
    fn id(&self) -> &str {
        RATE_LIMIT
    }

    fn name(&self) -> &str {
        "Rate limit"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        if ctx.get_bool("rate_limit_exceeded") == Some(true) {
            return ConditionResult::Match;
        }
        let message_matches = match (RATE_LIMIT_SIGNATURE.as_ref(), ctx.get_str("error_message")) {
            (Some(regex), Some(message)) => regex.is_match(&message),
            _ => false,
        };
        if message_matches {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Rate limit reached");
        data.insert("error_message".into(), text_or(ctx, "error_message", "Rate limit exceeded"));
        data.insert("reset_time".into(), text_or(ctx, "reset_time", "unknown"));
        data.insert("limit_type".into(), text_or(ctx, "limit_type", "api"));
        data
    }
}

/// A tool or the assistant reported an error
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorOccurredEvent;

impl NotificationEvent for ErrorOccurredEvent {
    fn id(&self) -> &str {
        ERROR_OCCURRED
    }

    fn name(&self) -> &str {
        "Error occurred"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        let flagged = ctx.get_bool("has_error") == Some(true);
        let has_message = ctx
            .get_str("error_message")
            .is_some_and(|message| !message.trim().is_empty());
        if flagged || has_message {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Error occurred");
        data.insert("error_message".into(), text_or(ctx, "error_message", "Unknown error"));
        data.insert("error_type".into(), text_or(ctx, "error_type", "error"));
        data.insert("tool_name".into(), text_or(ctx, "tool_name", "unknown"));
        data
    }
}

/// A new assistant session began
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStartEvent;

impl NotificationEvent for SessionStartEvent {
    fn id(&self) -> &str {
        SESSION_START
    }

    fn name(&self) -> &str {
        "Session start"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn default_enabled(&self) -> bool {
        false
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        if hook_event_is(ctx, &["Start", "SessionStart"]) {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Session started");
        data.insert("session_id".into(), text_or(ctx, "session_id", "unknown"));
        data.insert("source".into(), text_or(ctx, "source", "startup"));
        data
    }
}

/// The assistant is waiting on a permission decision
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationRequiredEvent;

impl NotificationEvent for ConfirmationRequiredEvent {
    fn id(&self) -> &str {
        CONFIRMATION_REQUIRED
    }

    fn name(&self) -> &str {
        "Confirmation required"
    }

    fn priority(&self) -> Priority {
        Priority::Critical
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        let requested = ctx.get_bool("confirmation_required") == Some(true)
            || hook_event_is(ctx, &["PermissionRequest"])
            || (hook_event_is(ctx, &["Notification"])
                && notification_type(ctx).as_deref() == Some("permission_prompt"));
        if requested {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Confirmation required");
        let operation = ctx
            .command_text()
            .or_else(|| ctx.get_str("message"))
            .unwrap_or_else(|| "Pending operation".to_string());
        data.insert("operation".into(), Value::String(operation));
        data.insert("message".into(), text_or(ctx, "message", "Waiting for confirmation"));
        data.insert("tool_name".into(), text_or(ctx, "tool_name", "unknown"));
        data
    }
}

/// The assistant has been idle waiting for input
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlePromptEvent;

impl NotificationEvent for IdlePromptEvent {
    fn id(&self) -> &str {
        IDLE_PROMPT
    }

    fn name(&self) -> &str {
        "Idle prompt"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn kind(&self) -> EventKind {
        EventKind::Builtin
    }

    fn default_enabled(&self) -> bool {
        false
    }

    fn check(&self, ctx: &HookContext) -> ConditionResult {
        if hook_event_is(ctx, &["Notification"])
            && notification_type(ctx).as_deref() == Some("idle_prompt")
        {
            ConditionResult::Match
        } else {
            ConditionResult::NoMatch
        }
    }

    fn extract_data(&self, ctx: &HookContext) -> EventData {
        let mut data = base_data(ctx, "Waiting for input");
        data.insert("message".into(), text_or(ctx, "message", "Claude is waiting for input"));
        data
    }
}
