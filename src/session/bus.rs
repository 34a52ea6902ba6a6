//! Session change propagation, in-context and cross-context.
//!
//! A [`SessionHub`] stands in for the origin: every open context attaches to
//! it with [`SessionHub::context`] and gets its own [`SessionBus`]. Publishing
//! delivers to same-context listeners synchronously and relays a storage
//! signal to every other live context, unordered relative to local delivery.
//!
//! Delivery is at-least-once per context and the bus buffers nothing:
//! listeners must be idempotent, re-reading the store as ground truth, and a
//! late subscriber picks up current state with one explicit read.

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
};

/// Session change notification. The payload tells a listener why it fired,
/// never what the session now is: the store is the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChanged {
    /// A session was established in this context.
    LoggedIn,
    /// The session was terminated in this context.
    LoggedOut,
    /// Another context of the origin changed the stored session.
    Storage,
}

type Listener = Arc<dyn Fn(SessionChanged) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl Registry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: SessionChanged) {
        // Snapshot first so a listener may subscribe or unsubscribe while
        // the event is being delivered.
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

/// One hub per origin; contexts attach to it to exchange session signals.
#[derive(Clone, Default)]
pub struct SessionHub {
    contexts: Arc<Mutex<Vec<Weak<Registry>>>>,
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new context on this origin.
    #[must_use]
    pub fn context(&self) -> SessionBus {
        let registry = Arc::new(Registry::default());
        let mut contexts = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        contexts.retain(|ctx| ctx.strong_count() > 0);
        contexts.push(Arc::downgrade(&registry));

        SessionBus {
            registry,
            hub: self.clone(),
        }
    }

    fn relay(&self, from: &Arc<Registry>) {
        let others: Vec<Arc<Registry>> = {
            let contexts = self
                .contexts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            contexts
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|ctx| !Arc::ptr_eq(ctx, from))
                .collect()
        };

        for context in others {
            context.dispatch(SessionChanged::Storage);
        }
    }
}

/// Per-context publish/subscribe handle.
#[derive(Clone)]
pub struct SessionBus {
    registry: Arc<Registry>,
    hub: SessionHub,
}

impl SessionBus {
    /// Deliver `event` to this context's listeners and signal every other
    /// open context of the origin.
    pub fn publish(&self, event: SessionChanged) {
        self.registry.dispatch(event);
        self.hub.relay(&self.registry);
    }

    /// Register a listener. The returned capability deregisters it on
    /// explicit [`Subscription::unsubscribe`] or on drop; invoking a
    /// listener whose component is gone must already be a no-op on the
    /// listener's side.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(SessionChanged) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push((id, Arc::new(listener)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }
}

/// Capability to deregister a listener. Dropping it unsubscribes.
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_listener(counter: &Arc<AtomicUsize>) -> impl Fn(SessionChanged) + Send + Sync {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn publish_reaches_same_context_listeners() {
        let hub = SessionHub::new();
        let bus = hub.context();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = bus.subscribe({
            let seen = Arc::clone(&seen);
            move |event| seen.lock().unwrap().push(event)
        });

        bus.publish(SessionChanged::LoggedIn);
        assert_eq!(*seen.lock().unwrap(), vec![SessionChanged::LoggedIn]);
    }

    #[test]
    fn publish_relays_to_other_contexts_as_storage_signal() {
        let hub = SessionHub::new();
        let tab_a = hub.context();
        let tab_b = hub.context();

        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let _sub = tab_b.subscribe({
            let seen = Arc::clone(&seen_b);
            move |event| seen.lock().unwrap().push(event)
        });

        tab_a.publish(SessionChanged::LoggedIn);
        assert_eq!(*seen_b.lock().unwrap(), vec![SessionChanged::Storage]);
    }

    #[test]
    fn publisher_does_not_hear_its_own_relay() {
        let hub = SessionHub::new();
        let bus = hub.context();
        let _other = hub.context();

        let count = Arc::new(AtomicUsize::new(0));
        let _sub = bus.subscribe(counter_listener(&count));

        bus.publish(SessionChanged::LoggedOut);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = SessionHub::new();
        let bus = hub.context();

        let count = Arc::new(AtomicUsize::new(0));
        let sub = bus.subscribe(counter_listener(&count));

        bus.publish(SessionChanged::LoggedIn);
        sub.unsubscribe();
        bus.publish(SessionChanged::LoggedOut);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let hub = SessionHub::new();
        let bus = hub.context();

        let count = Arc::new(AtomicUsize::new(0));
        {
            let _sub = bus.subscribe(counter_listener(&count));
        }

        bus.publish(SessionChanged::LoggedIn);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn closed_context_is_skipped() {
        let hub = SessionHub::new();
        let bus = hub.context();

        let count = Arc::new(AtomicUsize::new(0));
        let closed = hub.context();
        let _sub = closed.subscribe(counter_listener(&count));
        drop(closed);

        // Must not panic or deliver to the dropped context.
        bus.publish(SessionChanged::LoggedIn);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_subscribe_during_dispatch() {
        let hub = SessionHub::new();
        let bus = hub.context();

        let nested = Arc::new(Mutex::new(Vec::new()));
        let bus_for_listener = bus.clone();
        let nested_for_listener = Arc::clone(&nested);
        let _sub = bus.subscribe(move |_| {
            let sub = bus_for_listener.subscribe(|_| {});
            nested_for_listener.lock().unwrap().push(sub);
        });

        // Would deadlock if dispatch held the registry lock while invoking.
        bus.publish(SessionChanged::LoggedIn);
        assert_eq!(nested.lock().unwrap().len(), 1);
    }
}
