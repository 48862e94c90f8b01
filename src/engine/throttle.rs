//! Cooldown and frequency tracking per event id

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::config::{EventConditions, RateLimitSettings};

/// Source of "now" for throttling decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of a throttle check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Still inside the cooldown after the last fire
    Cooldown { remaining: Duration },
    /// `max_frequency` fires already inside the window
    FrequencyCapped { fired: usize, max: u32 },
    /// Global per-minute cap reached
    GlobalRateLimited { max_per_minute: u32 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::Admitted => write!(f, "admitted"),
            Admission::Cooldown { remaining } => {
                write!(f, "cooldown, {}s remaining", remaining.num_seconds())
            }
            Admission::FrequencyCapped { fired, max } => {
                write!(f, "frequency cap reached ({}/{})", fired, max)
            }
            Admission::GlobalRateLimited { max_per_minute } => {
                write!(f, "global rate limit of {} per minute reached", max_per_minute)
            }
        }
    }
}

#[derive(Debug, Default)]
struct EventHistory {
    last_fired: Option<DateTime<Utc>>,
    fires: VecDeque<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ThrottleInner {
    events: HashMap<String, EventHistory>,
    global: VecDeque<DateTime<Utc>>,
}

/// Fire history behind one lock so check-and-record is atomic
#[derive(Debug, Default)]
pub struct ThrottleState {
    inner: Mutex<ThrottleInner>,
}

fn prune(fires: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    // A window reaching past the start of time keeps everything
    let Some(cutoff) = now.checked_sub_signed(window) else {
        return;
    };
    while fires.front().is_some_and(|t| *t <= cutoff) {
        fires.pop_front();
    }
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every gate and, if all pass, record the fire at `now`.
    ///
    /// A rejected fire leaves the history untouched.
    pub fn admit(
        &self,
        event_id: &str,
        conditions: Option<&EventConditions>,
        global: Option<&RateLimitSettings>,
        now: DateTime<Utc>,
    ) -> Admission {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let window = conditions
            .map(EventConditions::window_duration)
            .unwrap_or_else(|| EventConditions::default().window_duration());
        let minute = Duration::seconds(60);

        if let Some(history) = inner.events.get_mut(event_id) {
            prune(&mut history.fires, now, window);

            if let (Some(cooldown), Some(last)) =
                (conditions.and_then(EventConditions::cooldown_duration), history.last_fired)
            {
                let elapsed = now - last;
                if elapsed < cooldown {
                    return Admission::Cooldown {
                        remaining: cooldown.checked_sub(&elapsed).unwrap_or(cooldown),
                    };
                }
            }

            if let Some(max) = conditions.and_then(|c| c.max_frequency) {
                let fired = history.fires.len();
                if fired >= max as usize {
                    return Admission::FrequencyCapped { fired, max };
                }
            }
        } else if conditions.and_then(|c| c.max_frequency) == Some(0) {
            return Admission::FrequencyCapped { fired: 0, max: 0 };
        }

        if let Some(limit) = global.filter(|limit| limit.enabled) {
            prune(&mut inner.global, now, minute);
            if inner.global.len() >= limit.max_per_minute as usize {
                return Admission::GlobalRateLimited {
                    max_per_minute: limit.max_per_minute,
                };
            }
        }

        let history = inner.events.entry(event_id.to_string()).or_default();
        history.last_fired = Some(now);
        history.fires.push_back(now);
        if global.is_some_and(|limit| limit.enabled) {
            inner.global.push_back(now);
        }
        Admission::Admitted
    }

    /// Forget the history of one event
    pub fn reset(&self, event_id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .remove(event_id);
    }

    /// Forget all history, including the global window
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.events.clear();
        inner.global.clear();
    }

    pub fn last_fired(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .get(event_id)
            .and_then(|history| history.last_fired)
    }

    /// Recorded fires with `now - t < window`
    pub fn fires_within(&self, event_id: &str, window: Duration, now: DateTime<Utc>) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .get(event_id)
            .map_or(0, |history| {
                history
                    .fires
                    .iter()
                    .filter(|t| now - **t < window && **t <= now)
                    .count()
            })
    }
}
