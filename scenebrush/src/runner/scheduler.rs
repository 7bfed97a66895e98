//! The task registry and its tick loop.
//!
//! [`TaskRunner`] owns a mapping from task id to task state and drives
//! every active task one resumption per tick. It subscribes to the host's
//! tick source only while tasks exist, cancels by id or by owner, and
//! contains panics so one faulting task cannot stall the rest of the
//! batch or the host's loop.
//!
//! All entry points, including the tick itself, must run on the same
//! thread; the runner is deliberately neither `Send` nor `Sync`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error};

use super::task::{OwnerId, Step, TaskBody, TaskId};
use super::tick::{TickHandle, TickSource};

/// Cooperative scheduler for suspendable tasks.
///
/// Cloning yields another handle to the same registry; completion
/// callbacks typically capture a clone so they can start follow-up tasks
/// or cancel siblings.
///
/// # Lifecycle
///
/// A task is registered by [`start`](TaskRunner::start), receives its
/// first resumption on the next tick, and leaves the registry when it
/// finishes, faults, or is cancelled. Ids are never reused and a removed
/// task is never resumed again.
#[derive(Clone)]
pub struct TaskRunner {
    registry: Rc<RefCell<Registry>>,
}

pub(crate) struct Registry {
    tasks: BTreeMap<TaskId, TaskEntry>,
    next_id: u64,
    subscribed: bool,
    ticking: bool,
    ticks: Rc<dyn TickSource>,
}

struct TaskEntry {
    /// Taken out of the entry while the body is being resumed.
    body: Option<Box<dyn TaskBody>>,
    owner: Option<OwnerId>,
    /// Shared with any in-flight nested drive so cancellation is
    /// observable between nested steps.
    alive: Rc<Cell<bool>>,
}

impl TaskRunner {
    /// Creates a runner bound to the given tick source.
    ///
    /// Nothing is subscribed until the first task starts.
    pub fn new(ticks: Rc<dyn TickSource>) -> Self {
        TaskRunner {
            registry: Rc::new(RefCell::new(Registry {
                tasks: BTreeMap::new(),
                next_id: 0,
                subscribed: false,
                ticking: false,
                ticks,
            })),
        }
    }

    /// Registers a task and returns its id.
    ///
    /// The body's first resumption happens on the next tick, never inside
    /// this call. Starting the first task subscribes the runner to its
    /// tick source.
    pub fn start(&self, body: impl TaskBody + 'static, owner: Option<OwnerId>) -> TaskId {
        self.start_boxed(Box::new(body), owner)
    }

    /// [`start`](TaskRunner::start) for an already boxed body.
    pub fn start_boxed(&self, body: Box<dyn TaskBody>, owner: Option<OwnerId>) -> TaskId {
        let (id, subscribe) = {
            let mut reg = self.registry.borrow_mut();
            let id = TaskId(reg.next_id);
            reg.next_id += 1;
            reg.tasks.insert(
                id,
                TaskEntry {
                    body: Some(body),
                    owner,
                    alive: Rc::new(Cell::new(true)),
                },
            );
            let subscribe = !reg.subscribed;
            reg.subscribed = true;
            (id, subscribe)
        };
        if subscribe {
            // Call out to the host only after the registry borrow is
            // released; tick sources may call back into the runner.
            let ticks = self.registry.borrow().ticks.clone();
            ticks.subscribe(TickHandle::new(Rc::downgrade(&self.registry)));
        }
        debug!(%id, "task started");
        id
    }

    /// Cancels a task.
    ///
    /// Idempotent: unknown or already finished ids are a no-op. A
    /// cancelled task receives no further resumptions and its completion
    /// callbacks are never invoked; work already in flight this tick runs
    /// to its next suspension point.
    pub fn cancel(&self, id: TaskId) {
        let removed = {
            let mut reg = self.registry.borrow_mut();
            match reg.tasks.remove(&id) {
                Some(entry) => {
                    entry.alive.set(false);
                    true
                }
                None => false,
            }
        };
        if removed {
            debug!(%id, "task cancelled");
        }
        self.release_if_idle();
    }

    /// Cancels every task started with the given owner.
    pub fn cancel_owner(&self, owner: OwnerId) {
        let cancelled = {
            let mut reg = self.registry.borrow_mut();
            let ids: Vec<TaskId> = reg
                .tasks
                .iter()
                .filter(|(_, entry)| entry.owner == Some(owner))
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                if let Some(entry) = reg.tasks.remove(id) {
                    entry.alive.set(false);
                }
            }
            ids.len()
        };
        if cancelled > 0 {
            debug!(?owner, count = cancelled, "owner tasks cancelled");
        }
        self.release_if_idle();
    }

    /// Number of tasks currently in the registry.
    pub fn active_tasks(&self) -> usize {
        self.registry.borrow().tasks.len()
    }

    fn release_if_idle(&self) {
        let unsubscribe = {
            let mut reg = self.registry.borrow_mut();
            // During a tick the end-of-batch check owns this decision.
            if reg.tasks.is_empty() && reg.subscribed && !reg.ticking {
                reg.subscribed = false;
                true
            } else {
                false
            }
        };
        if unsubscribe {
            let ticks = self.registry.borrow().ticks.clone();
            ticks.unsubscribe();
        }
    }
}

/// One scheduler tick: every task registered before the tick gets one
/// resumption; tasks started during the tick wait for the next one.
pub(crate) fn run_tick(registry: &Rc<RefCell<Registry>>) {
    {
        let mut reg = registry.borrow_mut();
        if reg.ticking {
            return;
        }
        reg.ticking = true;
    }

    let ids: Vec<TaskId> = registry.borrow().tasks.keys().copied().collect();
    for id in ids {
        let (mut body, alive) = {
            let mut reg = registry.borrow_mut();
            let Some(entry) = reg.tasks.get_mut(&id) else {
                // Cancelled earlier in this batch.
                continue;
            };
            if !entry.alive.get() {
                reg.tasks.remove(&id);
                continue;
            }
            match entry.body.take() {
                Some(body) => (body, entry.alive.clone()),
                None => continue,
            }
        };

        // The registry borrow is released here: the body may start or
        // cancel tasks on this runner while it runs.
        let has_more = resume_contained(id, body.as_mut(), &alive);

        let mut reg = registry.borrow_mut();
        if let Some(entry) = reg.tasks.get_mut(&id) {
            if has_more && entry.alive.get() {
                entry.body = Some(body);
            } else {
                entry.alive.set(false);
                reg.tasks.remove(&id);
                debug!(%id, "task finished");
            }
        }
        // A missing entry means the task cancelled itself during its own
        // resumption; the body is dropped without being re-registered.
    }

    let unsubscribe = {
        let mut reg = registry.borrow_mut();
        reg.ticking = false;
        if reg.tasks.is_empty() && reg.subscribed {
            reg.subscribed = false;
            true
        } else {
            false
        }
    };
    if unsubscribe {
        let ticks = registry.borrow().ticks.clone();
        ticks.unsubscribe();
    }
}

/// Resumes a body with panic containment. Returns whether the task has
/// more steps.
fn resume_contained(id: TaskId, body: &mut dyn TaskBody, alive: &Rc<Cell<bool>>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| drive(body, alive))) {
        Ok(has_more) => has_more,
        Err(payload) => {
            error!(%id, "task faulted: {}", panic_message(payload.as_ref()));
            false
        }
    }
}

fn drive(body: &mut dyn TaskBody, alive: &Rc<Cell<bool>>) -> bool {
    match body.resume() {
        Step::Finished => false,
        Step::Continue => true,
        Step::Nested(mut nested) => {
            drive_nested(nested.as_mut(), alive);
            alive.get()
        }
    }
}

/// Drives a nested sub-task to exhaustion within the current tick,
/// recursing into any deeper sub-tasks it yields. Cancellation of the
/// outer task is observed between nested steps.
fn drive_nested(nested: &mut dyn TaskBody, alive: &Rc<Cell<bool>>) {
    while alive.get() {
        match nested.resume() {
            Step::Finished => break,
            Step::Continue => {}
            Step::Nested(mut deeper) => drive_nested(deeper.as_mut(), alive),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
impl Registry {
    pub(crate) fn for_tests() -> Self {
        Registry {
            tasks: BTreeMap::new(),
            next_id: 0,
            subscribed: false,
            ticking: false,
            ticks: Rc::new(super::tick::ManualTickSource::new()),
        }
    }
}
