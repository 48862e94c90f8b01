//! Event matching and routing engine
//!
//! A `HookContext` is evaluated by every registered event: built-in events
//! with hardcoded predicates first, then custom events compiled from
//! configuration triggers. Matching events pass the throttle gates, get their
//! data extracted and channels resolved, and are optionally rendered.

pub mod conditions;
pub mod context;
pub mod events;
pub mod functions;
pub mod hook;
pub mod manager;
pub mod registry;
pub mod templates;
pub mod throttle;

pub use conditions::{ConditionResult, Trigger};
pub use context::HookContext;
pub use events::{CustomEvent, EventData, EventKind, NotificationEvent, Priority};
pub use functions::{FunctionEnv, FunctionRegistry};
pub use manager::{EventManager, TriggeredEvent};
pub use registry::CustomEventRegistry;
pub use templates::{TemplateRenderer, TemplateStore};
pub use throttle::{Admission, Clock, ManualClock, SystemClock, ThrottleState};
