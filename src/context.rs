//! Execution contexts decide which thread runs a settled promise's handlers.
//!
//! The crate has no scheduler of its own. It only needs two things from
//! whatever runs tasks: a way to [`submit`](Executor::submit) work and a way to
//! ask whether the calling thread is [already inside](Executor::is_current) it.
use crate::queue::SerialQueue;
use crate::Error;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run tasks: a thread, an event loop, a pool queue.
pub trait Executor: Send + Sync {
    /// Run `task` asynchronously. Tasks submitted from one thread must start
    /// in submission order if the executor is serial.
    fn submit(&self, task: Task);

    /// `true` when the calling thread is currently running one of this
    /// executor's tasks.
    fn is_current(&self) -> bool;

    fn label(&self) -> &str {
        "executor"
    }
}

/// Where handlers of a [`Source`](crate::Source) run once it settles.
#[derive(Clone, Default)]
pub enum ExecutionContext {
    /// Inline if the settling thread is inside the process-wide default
    /// executor, otherwise marshalled onto it.
    #[default]
    Unspecified,
    /// Always inline on whichever thread settles (or registers late).
    Synchronous,
    /// Inline if already inside this executor, otherwise submitted to it.
    Bound(Arc<dyn Executor>),
}

impl ExecutionContext {
    pub fn bound<X: Executor + 'static>(executor: Arc<X>) -> Self {
        ExecutionContext::Bound(executor)
    }

    /// Runs `task` according to this context: inline when already in the
    /// right place, submitted otherwise.
    pub fn execute(&self, task: Task) {
        match self {
            ExecutionContext::Synchronous => task(),
            ExecutionContext::Unspecified => execute_on(&*default_executor(), task),
            ExecutionContext::Bound(executor) => execute_on(&**executor, task),
        }
    }
}

fn execute_on(executor: &dyn Executor, task: Task) {
    if executor.is_current() {
        task();
    } else {
        executor.submit(task);
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionContext::Unspecified => f.write_str("Unspecified"),
            ExecutionContext::Synchronous => f.write_str("Synchronous"),
            ExecutionContext::Bound(executor) => {
                f.debug_tuple("Bound").field(&executor.label()).finish()
            }
        }
    }
}

static DEFAULT_EXECUTOR: OnceLock<Arc<dyn Executor>> = OnceLock::new();

/// Installs the executor behind [`ExecutionContext::Unspecified`].
///
/// Must happen before anything dispatches through the default context; once
/// the built-in `main` queue has been started, or another executor
/// installed, this returns [`Error::DefaultExecutorInstalled`].
pub fn install_default_executor(executor: Arc<dyn Executor>) -> Result<(), Error> {
    let label = executor.label().to_owned();
    DEFAULT_EXECUTOR
        .set(executor)
        .map_err(|_| Error::DefaultExecutorInstalled)?;
    tracing::debug!(executor = %label, "installed default executor");
    Ok(())
}

/// The process-wide default executor, starting the built-in `main` serial
/// queue on first use if none was installed. It lives for the rest of the
/// process.
pub fn default_executor() -> Arc<dyn Executor> {
    DEFAULT_EXECUTOR
        .get_or_init(|| Arc::new(SerialQueue::new("main")) as Arc<dyn Executor>)
        .clone()
}
