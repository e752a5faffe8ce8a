//! Publish/subscribe capability for event-driven steps.
//!
//! The run engine only needs to attach and detach listeners; anything that can
//! do that implements [`EventSource`]. [`EventEmitter`] is a small in-process
//! implementation for tests and for wiring callbacks from other libraries.

use crate::context::Done;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Arguments carried by an event occurrence.
pub type Payload = serde_json::Value;

/// Callback attached to an [`EventSource`].
pub type EventListener = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Handler of an event-driven step. Receives the payload and a completion
/// handle that closes the occurrence's sample.
pub type EventHandler = Arc<dyn Fn(Payload, Done) + Send + Sync>;

/// Handle returned by [`EventSource::on`], used to detach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An external publish/subscribe object.
pub trait EventSource: Send + Sync {
    /// Attach `listener` to `event`. It stays attached until [`EventSource::off`].
    fn on(&self, event: &str, listener: EventListener) -> ListenerId;

    /// Detach a listener. Returns `false` if it was not attached.
    fn off(&self, event: &str, id: ListenerId) -> bool;
}

/// In-process event emitter.
///
/// `emit` calls listeners synchronously, in registration order, on the
/// caller's thread. Listeners may emit further events.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, EventListener)>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, EventListener)>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver `payload` to every listener of `event`. Returns how many ran.
    pub fn emit(&self, event: &str, payload: impl Into<Payload>) -> usize {
        // Snapshot so listeners run without holding the registry lock.
        let listeners: Vec<EventListener> = match self.lock().get(event) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };
        let payload = payload.into();
        for listener in &listeners {
            listener(&payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map(Vec::len).unwrap_or(0)
    }
}

impl EventSource for EventEmitter {
    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self
            .lock()
            .iter()
            .map(|(name, list)| (name.clone(), list.len()))
            .collect();
        events.sort();
        f.debug_struct("EventEmitter").field("listeners", &events).finish()
    }
}

/// The event an event-driven step waits on each iteration.
#[derive(Clone)]
pub struct EventBinding {
    pub(crate) source: Arc<dyn EventSource>,
    pub(crate) event: String,
    pub(crate) handler: EventHandler,
}

impl EventBinding {
    pub fn new<H>(source: Arc<dyn EventSource>, event: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Payload, Done) + Send + Sync + 'static,
    {
        Self {
            source,
            event: event.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn should_call_listeners_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            emitter.on(
                "tick",
                Arc::new(move |payload: &Payload| {
                    order.lock().unwrap().push(format!("{tag}:{payload}"));
                }),
            );
        }

        assert_eq!(emitter.emit("tick", 7), 2);
        assert_eq!(*order.lock().unwrap(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn should_return_zero_when_no_listeners() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit("nobody", Payload::Null), 0);
    }

    #[test]
    fn should_stop_delivering_when_listener_removed() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = emitter.on(
            "x",
            Arc::new(move |_: &Payload| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        emitter.emit("x", Payload::Null);
        assert!(emitter.off("x", id));
        assert!(!emitter.off("x", id));
        emitter.emit("x", Payload::Null);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("x"), 0);
    }

    #[test]
    fn should_allow_emit_from_inside_listener() {
        let emitter = Arc::new(EventEmitter::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&emitter);
        emitter.on(
            "outer",
            Arc::new(move |_: &Payload| {
                inner.emit("inner", Payload::Null);
            }),
        );
        let counter = Arc::clone(&hits);
        emitter.on(
            "inner",
            Arc::new(move |_: &Payload| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        emitter.emit("outer", Payload::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
