use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::conditions::ConditionResult;
use super::context::HookContext;
use super::events::{
    default_events_with_signatures, sensitive_signatures, EventData, EventKind, NotificationEvent,
    Priority,
};
use super::functions::FunctionRegistry;
use super::registry::CustomEventRegistry;
use super::templates::TemplateRenderer;
use super::throttle::{Clock, SystemClock, ThrottleState};
use crate::config::{CustomEventSpec, EventConditions, NotifierConfig};
use crate::Result;

/// An event that matched, passed throttling and is ready for delivery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredEvent {
    pub event_id: String,
    pub event_name: String,
    pub kind: EventKind,
    pub priority: Priority,
    pub channels: Vec<String>,
    pub data: EventData,
    /// Template id used for rendering
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Evaluates every registered event against hook contexts
///
/// Built-in events run first in their fixed order, then custom events in
/// registration order. Throttle state is owned by the manager instance.
pub struct EventManager {
    config: NotifierConfig,
    builtins: Vec<Box<dyn NotificationEvent>>,
    custom: CustomEventRegistry,
    functions: Arc<FunctionRegistry>,
    enabled_overrides: HashMap<String, bool>,
    channel_overrides: HashMap<String, Vec<String>>,
    throttle: ThrottleState,
    clock: Arc<dyn Clock>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("events", &self.event_ids())
            .field("enabled_overrides", &self.enabled_overrides)
            .field("channel_overrides", &self.channel_overrides)
            .field("has_renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}

impl EventManager {
    /// Build the manager from configuration.
    ///
    /// Custom events that fail validation are logged and skipped.
    pub fn new(config: &NotifierConfig) -> Self {
        let signatures = sensitive_signatures(config);
        let functions = Arc::new(
            FunctionRegistry::builtin()
                .with_work_hours(config.notifications.work_hours.clone())
                .with_sensitive_signatures(Arc::clone(&signatures)),
        );
        let custom = load_custom_events(config, Arc::clone(&functions));

        let manager = Self {
            config: config.clone(),
            builtins: default_events_with_signatures(signatures),
            custom,
            functions,
            enabled_overrides: HashMap::new(),
            channel_overrides: HashMap::new(),
            throttle: ThrottleState::new(),
            clock: Arc::new(SystemClock),
            renderer: None,
        };
        info!(
            "Event manager ready: {} built-in, {} custom events",
            manager.builtins.len(),
            manager.custom.len()
        );
        manager
    }

    pub fn with_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the function registry. Custom events are recompiled from the
    /// configuration, so call this before adding events at runtime.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self.custom = load_custom_events(&self.config, Arc::clone(&self.functions));
        self
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Evaluate all enabled events; returns the ones that fired, in order
    pub fn process_context(&self, ctx: &HookContext) -> Vec<TriggeredEvent> {
        let now = self.clock.now();
        let global = self.config.notifications.rate_limiting.as_ref();
        let mut triggered = Vec::new();

        for event in self.events() {
            let id = event.id();
            if !self.is_event_enabled(id) {
                continue;
            }

            match event.check(ctx) {
                ConditionResult::Match => {}
                ConditionResult::NoMatch => continue,
                ConditionResult::Error(e) => {
                    warn!("Event '{}' could not be evaluated: {}", id, e);
                    continue;
                }
            }

            let admission = self
                .throttle
                .admit(id, self.effective_conditions(event), global, now);
            if !admission.is_admitted() {
                info!("Event '{}' suppressed: {}", id, admission);
                continue;
            }

            info!("Event '{}' triggered ({})", id, event.priority());
            let data = event.extract_data(ctx);
            let template = self.template_id(event);
            let rendered = self.render(event, &template, &data);

            triggered.push(TriggeredEvent {
                event_id: id.to_string(),
                event_name: event.name().to_string(),
                kind: event.kind(),
                priority: event.priority(),
                channels: self.resolve_channels(event),
                data,
                template,
                rendered,
                timestamp: now,
            });
        }

        debug!("{} events triggered", triggered.len());
        triggered
    }

    /// Built-ins first, then custom events in registration order
    fn events(&self) -> impl Iterator<Item = &(dyn NotificationEvent + 'static)> + '_ {
        let builtins = self.builtins.iter().map(|event| &**event);
        let custom = self
            .custom
            .iter()
            .map(|event| event as &(dyn NotificationEvent + 'static));
        builtins.chain(custom)
    }

    pub fn get_event(&self, event_id: &str) -> Option<&dyn NotificationEvent> {
        self.events().find(|event| event.id() == event_id)
    }

    /// All event ids in evaluation order
    pub fn event_ids(&self) -> Vec<String> {
        self.events().map(|event| event.id().to_string()).collect()
    }

    /// Runtime override, then `events.<id>.enabled`, then the event default
    pub fn is_event_enabled(&self, event_id: &str) -> bool {
        if let Some(enabled) = self.enabled_overrides.get(event_id) {
            return *enabled;
        }
        if let Some(enabled) = self
            .config
            .event_settings(event_id)
            .and_then(|settings| settings.enabled)
        {
            return enabled;
        }
        self.get_event(event_id)
            .is_some_and(|event| event.default_enabled())
    }

    /// Returns false when no event has this id
    pub fn enable_event(&mut self, event_id: &str) -> bool {
        self.set_enabled(event_id, true)
    }

    /// Returns false when no event has this id
    pub fn disable_event(&mut self, event_id: &str) -> bool {
        self.set_enabled(event_id, false)
    }

    fn set_enabled(&mut self, event_id: &str, enabled: bool) -> bool {
        if self.get_event(event_id).is_none() {
            warn!("Cannot change state of unknown event '{}'", event_id);
            return false;
        }
        self.enabled_overrides.insert(event_id.to_string(), enabled);
        debug!("Event '{}' enabled={}", event_id, enabled);
        true
    }

    /// Route an event to these channels, ahead of any configuration
    pub fn set_event_channels(&mut self, event_id: &str, channels: Vec<String>) {
        self.channel_overrides.insert(event_id.to_string(), channels);
    }

    pub fn clear_event_channels(&mut self, event_id: &str) {
        self.channel_overrides.remove(event_id);
    }

    /// Register or replace a custom event; its throttle history starts fresh
    pub fn add_custom_event(&mut self, event_id: &str, spec: &CustomEventSpec) -> Result<()> {
        self.custom.add(event_id, spec)?;
        self.throttle.reset(event_id);
        Ok(())
    }

    /// Remove a custom event and its runtime overrides; returns whether it existed
    pub fn remove_custom_event(&mut self, event_id: &str) -> bool {
        let removed = self.custom.remove(event_id);
        if removed {
            self.enabled_overrides.remove(event_id);
            self.channel_overrides.remove(event_id);
            self.throttle.reset(event_id);
        }
        removed
    }

    pub fn custom_registry(&self) -> &CustomEventRegistry {
        &self.custom
    }

    /// Forget fire history for one event, or for all when `None`
    pub fn reset_throttle(&self, event_id: Option<&str>) {
        match event_id {
            Some(id) => self.throttle.reset(id),
            None => self.throttle.clear(),
        }
    }

    /// `events.<id>.conditions`, else the event's own
    fn effective_conditions<'a>(
        &'a self,
        event: &'a dyn NotificationEvent,
    ) -> Option<&'a EventConditions> {
        self.config
            .event_settings(event.id())
            .and_then(|settings| settings.conditions.as_ref())
            .or_else(|| event.conditions())
    }

    fn resolve_channels(&self, event: &dyn NotificationEvent) -> Vec<String> {
        let id = event.id();
        if let Some(channels) = self.channel_overrides.get(id) {
            return channels.clone();
        }
        if let Some(channels) = self
            .config
            .event_settings(id)
            .and_then(|settings| settings.channels.as_ref())
        {
            return channels.clone();
        }
        if let Some(channels) = event.channels() {
            return channels.to_vec();
        }
        self.config.notifications.default_channels.clone()
    }

    fn configured_template(&self, event_id: &str) -> Option<&str> {
        self.config
            .event_settings(event_id)
            .and_then(|settings| settings.template.as_deref())
    }

    fn template_id(&self, event: &dyn NotificationEvent) -> String {
        self.configured_template(event.id())
            .map(str::to_string)
            .unwrap_or_else(|| event.template())
    }

    fn render(&self, event: &dyn NotificationEvent, template: &str, data: &EventData) -> Option<Value> {
        let renderer = self.renderer.as_ref()?;

        if self.configured_template(event.id()).is_none() {
            if let Some(inline) = event.inline_template() {
                return Some(renderer.render_inline(inline, data));
            }
        }

        let rendered = renderer.render(template, data);
        if rendered.is_none() {
            warn!("Template '{}' not found for event '{}'", template, event.id());
        }
        rendered
    }
}

fn load_custom_events(config: &NotifierConfig, functions: Arc<FunctionRegistry>) -> CustomEventRegistry {
    let mut registry = CustomEventRegistry::with_functions(functions);
    for (id, raw) in &config.custom_events {
        if let Err(e) = registry.add_raw(id, raw) {
            warn!("Skipping custom event: {}", e);
        }
    }
    registry
}
