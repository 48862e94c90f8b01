use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::events::builtin::is_builtin_id;
use super::events::CustomEvent;
use super::functions::{shared_builtin, FunctionRegistry};
use crate::config::CustomEventSpec;
use crate::{NotifierError, Result};

/// Custom events keyed by id, kept in registration order
#[derive(Debug, Clone)]
pub struct CustomEventRegistry {
    order: Vec<String>,
    events: HashMap<String, CustomEvent>,
    functions: Arc<FunctionRegistry>,
}

impl Default for CustomEventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomEventRegistry {
    pub fn new() -> Self {
        Self::with_functions(shared_builtin())
    }

    /// Registry whose events resolve functions in `functions`
    pub fn with_functions(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            order: Vec::new(),
            events: HashMap::new(),
            functions,
        }
    }

    /// Validate, compile and store an event; an existing id is replaced in place
    pub fn add(&mut self, id: &str, spec: &CustomEventSpec) -> Result<()> {
        if id.trim().is_empty() {
            return Err(NotifierError::invalid_event(id, "event id must not be empty"));
        }
        if is_builtin_id(id) {
            return Err(NotifierError::invalid_event(
                id,
                "id is reserved for a built-in event",
            ));
        }
        if spec.name.trim().is_empty() {
            return Err(NotifierError::invalid_event(id, "missing event name"));
        }
        if spec.triggers.is_empty() {
            return Err(NotifierError::invalid_event(id, "at least one trigger is required"));
        }

        let event = CustomEvent::with_functions(id, spec, Arc::clone(&self.functions))?;
        if self.events.insert(id.to_string(), event).is_some() {
            debug!("Replaced custom event '{}'", id);
        } else {
            self.order.push(id.to_string());
            info!("Registered custom event '{}'", id);
        }
        Ok(())
    }

    /// Parse a raw configuration value, then `add` it
    pub fn add_raw(&mut self, id: &str, raw: &Value) -> Result<()> {
        let spec: CustomEventSpec = serde_json::from_value(raw.clone())
            .map_err(|e| NotifierError::invalid_event(id, e.to_string()))?;
        self.add(id, &spec)
    }

    /// Remove an event; returns whether it existed
    pub fn remove(&mut self, id: &str) -> bool {
        if self.events.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            info!("Removed custom event '{}'", id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &str) -> Option<&CustomEvent> {
        self.events.get(id)
    }

    /// Ids in registration order
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Events in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CustomEvent> {
        self.order.iter().filter_map(|id| self.events.get(id))
    }
}
