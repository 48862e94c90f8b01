pub mod channels;
pub mod config;
pub mod engine;
pub mod error;
pub mod notifier;

pub use config::{ConfigLoader, CustomEventSpec, NotifierConfig, TriggerSpec};
pub use engine::{EventManager, HookContext, NotificationEvent, Priority, TriggeredEvent};
pub use error::{NotifierError, Result};
pub use notifier::{NotificationOutcome, Notifier};
