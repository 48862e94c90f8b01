//! Configuration types and loading

pub mod loader;
pub mod triggers;
pub mod types;

pub use loader::ConfigLoader;
pub use triggers::{CaptureGroup, CustomEventSpec, ExtractorSpec, StructuredExtractor, TriggerSpec};
pub use types::{
    EventConditions, EventSettings, NotificationSettings, NotifierConfig, RateLimitSettings,
    TemplateSettings, WorkHours,
};
