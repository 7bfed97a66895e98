//! Subcommand implementations.

pub mod generate;
pub mod validate;

use std::rc::Rc;
use std::thread;
use std::time::Duration;

use scenebrush::runner::{ManualTickSource, TaskRunner};

/// Interval between ticks while tasks are active.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Resolves the API key from a flag value or the environment.
pub(crate) fn resolve_api_key(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("GEMINI_API_KEY").ok())
}

/// Drives the runner until it goes idle.
pub(crate) fn run_to_idle(ticks: &Rc<ManualTickSource>, runner: &TaskRunner) {
    while runner.active_tasks() > 0 {
        ticks.drive();
        thread::sleep(TICK_INTERVAL);
    }
}
