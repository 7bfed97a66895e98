//! Broadcast bus for generation progress.
//!
//! Pipeline tasks publish fractional progress with a stage description;
//! any number of listeners observe it. Subscriptions are owned: dropping
//! the [`ProgressSubscription`] guard unsubscribes, so a listener cannot
//! outlive the context that registered it.
//!
//! Delivery happens synchronously on the tick thread. Updates from a
//! single task arrive in the order it emitted them; updates from
//! concurrent tasks may interleave arbitrarily.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// One progress notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Overall completion in `[0.0, 1.0]`.
    pub fraction: f32,
    /// Short description of the current stage.
    pub stage: String,
}

type Listener = Rc<dyn Fn(&ProgressUpdate)>;

#[derive(Default)]
struct BusInner {
    next_token: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Multi-subscriber progress broadcast.
///
/// Cheap to clone; clones share the subscriber list.
#[derive(Clone, Default)]
pub struct ProgressBus {
    inner: Rc<RefCell<BusInner>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener; it receives every update published while the
    /// returned guard is alive.
    #[must_use = "dropping the subscription immediately unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&ProgressUpdate) + 'static) -> ProgressSubscription {
        let mut inner = self.inner.borrow_mut();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.listeners.push((token, Rc::new(listener)));
        ProgressSubscription {
            bus: Rc::downgrade(&self.inner),
            token,
        }
    }

    /// Publishes an update to all current listeners.
    pub fn publish(&self, fraction: f32, stage: &str) {
        let update = ProgressUpdate {
            fraction,
            stage: stage.to_string(),
        };
        // Snapshot so listeners may subscribe/unsubscribe during delivery.
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(&update);
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

/// Guard for one bus subscription; unsubscribes on drop.
pub struct ProgressSubscription {
    bus: Weak<RefCell<BusInner>>,
    token: u64,
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .borrow_mut()
                .listeners
                .retain(|(token, _)| *token != self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_arrive_in_publish_order() {
        let bus = ProgressBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let _sub = bus.subscribe(move |update| sink.borrow_mut().push(update.clone()));

        bus.publish(0.1, "Building request...");
        bus.publish(0.2, "Sending request...");
        bus.publish(1.0, "Complete");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].fraction, 0.1);
        assert_eq!(seen[0].stage, "Building request...");
        assert_eq!(seen[2].fraction, 1.0);
    }

    #[test]
    fn test_multiple_listeners_all_notified() {
        let bus = ProgressBus::new();
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));

        let a = first.clone();
        let b = second.clone();
        let _sub_a = bus.subscribe(move |_| *a.borrow_mut() += 1);
        let _sub_b = bus.subscribe(move |_| *b.borrow_mut() += 1);

        bus.publish(0.5, "halfway");
        assert_eq!(*first.borrow(), 1);
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = ProgressBus::new();
        let count = Rc::new(RefCell::new(0));

        let sink = count.clone();
        let sub = bus.subscribe(move |_| *sink.borrow_mut() += 1);
        bus.publish(0.1, "first");
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        bus.publish(0.2, "second");
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_subscription_outliving_bus_is_harmless() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        drop(sub);
    }

    #[test]
    fn test_listener_may_unsubscribe_another_during_delivery() {
        let bus = ProgressBus::new();
        let slot: Rc<RefCell<Option<ProgressSubscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(RefCell::new(0));

        let sink = count.clone();
        *slot.borrow_mut() = Some(bus.subscribe(move |_| *sink.borrow_mut() += 1));

        // This listener drops the other subscription mid-delivery; the
        // snapshot keeps the current publish consistent.
        let target = slot.clone();
        let _killer = bus.subscribe(move |_| {
            target.borrow_mut().take();
        });

        bus.publish(0.3, "during");
        bus.publish(0.6, "after");
        assert!(*count.borrow() <= 2);
        assert_eq!(bus.listener_count(), 1);
    }
}
