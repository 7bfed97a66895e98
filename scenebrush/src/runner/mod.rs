//! Cooperative tick-driven task runner.
//!
//! Long-running operations (network calls, staged work) are expressed as
//! [`TaskBody`] state machines and registered with a [`TaskRunner`]. The
//! host's loop drives the runner through a [`TickSource`]; each tick gives
//! every active task exactly one resumption. Sub-tasks yielded via
//! [`Step::Nested`] are flattened: they run to completion inside the tick
//! that produced them, so only the outermost task is tick-granular.
//!
//! ```text
//!  host loop ──tick──► TaskRunner ──resume──► task body
//!                         │                      │
//!                         │◄── Continue / Nested(sub-task) / Finished
//!                         │
//!                  subscribe while non-empty,
//!                  unsubscribe when idle
//! ```
//!
//! Cancellation (by id or by owner) is cooperative: it suppresses the
//! task's next resumption rather than interrupting a step in progress.
//! A panic inside a resumption is contained, logged, and terminal for
//! that task alone.

mod scheduler;
mod task;
mod tick;

pub use scheduler::TaskRunner;
pub use task::{OwnerId, Step, TaskBody, TaskId};
pub use tick::{ManualTickSource, TickHandle, TickSource};
