use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::payload::{Event, Payload};

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    /// `*` is only valid as a trailing `.*` segment.
    #[error("bad topic pattern: {pattern:?} (wildcards must end with '.*')")]
    BadPattern { pattern: String },
}

/// Token for one registration; pass it to [`EventBus::off`] to remove it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    topic: String,
    id: u64,
}

#[derive(Default)]
struct Tables {
    exact: FxHashMap<String, Vec<(u64, Handler)>>,
    wildcard: Vec<(String, Vec<(u64, Handler)>)>,
    next_id: u64,
}

/// Thread-safe hierarchical event bus.
///
/// Topics are dotted names (`processing.complete`); subscribers use either
/// the exact name or a suffix wildcard (`processing.*`). Handlers are
/// snapshotted under the lock and invoked outside it, so a handler may
/// freely emit or subscribe without deadlocking the bus.
pub struct EventBus {
    tables: Mutex<Tables>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Subscribe `handler` to `topic` (exact or `prefix.*`).
    pub fn on<F>(&self, topic: &str, handler: F) -> Result<Subscription, EventError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut tables = self.tables.lock();
        let id = tables.next_id;
        tables.next_id += 1;

        if let Some(stripped) = topic.strip_suffix(".*") {
            if stripped.is_empty() || stripped.contains('*') {
                return Err(EventError::BadPattern {
                    pattern: topic.to_string(),
                });
            }
            match tables.wildcard.iter().position(|(p, _)| p == topic) {
                Some(i) => tables.wildcard[i].1.push((id, handler)),
                None => tables.wildcard.push((topic.to_string(), vec![(id, handler)])),
            }
        } else if topic.contains('*') {
            return Err(EventError::BadPattern {
                pattern: topic.to_string(),
            });
        } else {
            tables
                .exact
                .entry(topic.to_string())
                .or_default()
                .push((id, handler));
        }

        Ok(Subscription {
            topic: topic.to_string(),
            id,
        })
    }

    /// Remove one subscription. Unknown subscriptions are a no-op.
    pub fn off(&self, subscription: &Subscription) {
        let mut tables = self.tables.lock();
        if subscription.topic.ends_with('*') {
            if let Some((_, handlers)) = tables
                .wildcard
                .iter_mut()
                .find(|(p, _)| p == &subscription.topic)
            {
                handlers.retain(|(id, _)| *id != subscription.id);
            }
        } else if let Some(handlers) = tables.exact.get_mut(&subscription.topic) {
            handlers.retain(|(id, _)| *id != subscription.id);
        }
    }

    /// Emit `topic` with `payload`, capturing the caller as sender.
    #[track_caller]
    pub fn emit(&self, topic: &str, payload: Payload) {
        self.dispatch(topic, caller_identity(), payload);
    }

    /// Emit with an explicit sender identity.
    pub fn emit_from(&self, sender: impl Into<String>, topic: &str, payload: Payload) {
        self.dispatch(topic, sender.into(), payload);
    }

    /// Emit after `delay` on a timer thread.
    ///
    /// Takes the `Arc` handle so the timer thread can outlive the caller's
    /// borrow; clone the handle when emitting more than once. The sender
    /// identity is captured here, at emit time, and travels with the
    /// deferred event.
    #[track_caller]
    pub fn emit_delayed(self: Arc<Self>, topic: &str, delay: Duration, payload: Payload) {
        let sender = caller_identity();
        let topic = topic.to_string();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            self.dispatch(&topic, sender, payload);
        });
    }

    fn dispatch(&self, topic: &str, sender: String, payload: Payload) {
        let snapshot = self.snapshot_handlers(topic);
        if snapshot.is_empty() {
            return;
        }
        let event = Event {
            topic: topic.to_string(),
            sender,
            payload,
        };
        for handler in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                tracing::error!(topic = %event.topic, "event handler panicked");
            }
        }
    }

    fn snapshot_handlers(&self, topic: &str) -> Vec<Handler> {
        let tables = self.tables.lock();
        let mut snapshot: Vec<Handler> = Vec::new();
        if let Some(handlers) = tables.exact.get(topic) {
            snapshot.extend(handlers.iter().map(|(_, h)| Arc::clone(h)));
        }
        for (pattern, handlers) in &tables.wildcard {
            // "a.b.*" matches every topic under "a.b." but not "a.b" itself.
            let prefix = &pattern[..pattern.len() - 1];
            if topic.starts_with(prefix) {
                snapshot.extend(handlers.iter().map(|(_, h)| Arc::clone(h)));
            }
        }
        snapshot
    }
}

#[track_caller]
fn caller_identity() -> String {
    let loc = Location::caller();
    format!("{}:{}", loc.file(), loc.line())
}

static GLOBAL: Lazy<Arc<EventBus>> = Lazy::new(|| Arc::new(EventBus::new()));

/// Process-wide default bus. Components take an `Arc<EventBus>` so tests can
/// wire a private instance instead.
pub fn global() -> Arc<EventBus> {
    Arc::clone(&GLOBAL)
}
