//! Tick source seam.
//!
//! The runner does not own a loop of its own; the host drives it by
//! invoking a [`TickHandle`] once per iteration of whatever loop it
//! already has (a frame loop, an editor update hook, a polling loop).
//! The runner subscribes its handle when the first task starts and
//! unsubscribes when the registry empties, so an idle runner costs the
//! host nothing per iteration.

use std::cell::RefCell;
use std::rc::Weak;

use super::scheduler::{run_tick, Registry};

/// Host-side hook the runner attaches its tick callback to.
///
/// Exactly one handle is subscribed at a time. Implementations store the
/// handle on `subscribe`, invoke [`TickHandle::tick`] once per host
/// iteration while subscribed, and discard the handle on `unsubscribe`.
pub trait TickSource {
    /// Registers the runner's tick callback.
    fn subscribe(&self, handle: TickHandle);

    /// Removes the previously registered callback.
    fn unsubscribe(&self);
}

/// The runner's tick callback, handed to a [`TickSource`].
///
/// The handle holds a weak reference to the runner's registry: ticking
/// after the runner has been dropped is a harmless no-op, so a host that
/// forgets to unsubscribe on teardown cannot resume freed tasks.
pub struct TickHandle {
    registry: Weak<RefCell<Registry>>,
}

impl TickHandle {
    pub(crate) fn new(registry: Weak<RefCell<Registry>>) -> Self {
        TickHandle { registry }
    }

    /// Runs one scheduler tick: every active task gets one resumption.
    pub fn tick(&self) {
        if let Some(registry) = self.registry.upgrade() {
            run_tick(&registry);
        }
    }

    /// Whether the owning runner is still alive.
    pub fn is_live(&self) -> bool {
        self.registry.strong_count() > 0
    }
}

/// A tick source driven explicitly by the host.
///
/// Suits hosts whose loop is their own (the CLI) and tests that need
/// deterministic tick-by-tick control.
#[derive(Default)]
pub struct ManualTickSource {
    handle: RefCell<Option<TickHandle>>,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one tick to the subscribed handle, if any.
    ///
    /// Returns true if a handle was subscribed.
    pub fn drive(&self) -> bool {
        // The handle is cloned out so a tick that ends with the runner
        // unsubscribing (registry emptied) can re-borrow the slot.
        let handle = {
            let slot = self.handle.borrow();
            slot.as_ref().map(|h| TickHandle {
                registry: h.registry.clone(),
            })
        };
        match handle {
            Some(handle) => {
                handle.tick();
                true
            }
            None => false,
        }
    }

    /// Whether the runner currently has a callback subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.handle.borrow().is_some()
    }
}

impl TickSource for ManualTickSource {
    fn subscribe(&self, handle: TickHandle) {
        *self.handle.borrow_mut() = Some(handle);
    }

    fn unsubscribe(&self) {
        *self.handle.borrow_mut() = None;
    }
}
