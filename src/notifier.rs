use serde::Serialize;
use tracing::{info, warn};

use crate::channels::{ChannelRegistry, DispatchReport};
use crate::config::NotifierConfig;
use crate::engine::{EventManager, HookContext, TemplateStore, TriggeredEvent};
use crate::Result;

/// A triggered event together with its delivery report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationOutcome {
    pub event: TriggeredEvent,
    pub report: DispatchReport,
}

/// Event manager plus the channels its events are delivered to
pub struct Notifier {
    manager: EventManager,
    channels: ChannelRegistry,
}

impl Notifier {
    pub fn new(manager: EventManager, channels: ChannelRegistry) -> Self {
        Self { manager, channels }
    }

    /// Manager with built-in templates (plus `templates.custom_dir`) and no channels
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let mut templates = TemplateStore::with_builtin_templates();
        if let Some(dir) = &config.templates.custom_dir {
            if dir.is_dir() {
                let loaded = templates.load_dir(dir)?;
                info!("Loaded {} templates from {}", loaded, dir.display());
            } else {
                warn!("Template directory {} does not exist", dir.display());
            }
        }

        let manager = EventManager::new(config).with_renderer(templates);
        Ok(Self::new(manager, ChannelRegistry::new()))
    }

    pub fn manager(&self) -> &EventManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EventManager {
        &mut self.manager
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.channels
    }

    /// Evaluate a context and deliver everything that fired
    pub fn handle(&self, ctx: &HookContext) -> Vec<NotificationOutcome> {
        self.manager
            .process_context(ctx)
            .into_iter()
            .map(|event| {
                let report = self.channels.dispatch(&event);
                if !report.all_delivered() {
                    warn!(
                        "Event '{}': {} delivered, {} failed, {} unknown channels",
                        event.event_id,
                        report.delivered.len(),
                        report.failed.len(),
                        report.missing.len()
                    );
                }
                NotificationOutcome { event, report }
            })
            .collect()
    }
}
