//! Deferred execution used by [`Promise::delay`](crate::Promise::delay).
use crate::context::{ExecutionContext, Task};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

/// Runs a task on an execution context once a delay has passed.
pub trait Timer: Send + Sync {
    fn schedule(&self, after: Duration, context: ExecutionContext, task: Task);
}

/// Sleeps on a short-lived helper thread, then hands the task to the
/// requested context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimer;

impl Timer for ThreadTimer {
    fn schedule(&self, after: Duration, context: ExecutionContext, task: Task) {
        let spawned = thread::Builder::new()
            .name("promise-timer".into())
            .spawn(move || {
                thread::sleep(after);
                context.execute(task);
            });
        if let Err(err) = spawned {
            tracing::error!(%err, ?after, "could not start timer thread, delayed task dropped");
        }
    }
}

pub(crate) fn default_timer() -> Arc<dyn Timer> {
    static TIMER: OnceLock<Arc<dyn Timer>> = OnceLock::new();
    TIMER
        .get_or_init(|| Arc::new(ThreadTimer) as Arc<dyn Timer>)
        .clone()
}
