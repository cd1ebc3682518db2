#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```
use promise_dispatch::{ExecutionContext, Executor, SerialQueue, Source, Task, WarnPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Once;
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// How long a test waits for something that should happen.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a test waits for something that should never happen.
pub const NEVER_TIMEOUT: Duration = Duration::from_millis(100);

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Unresolved source whose handlers run inline and which never reports.
pub fn sync_source<T, E>() -> Source<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    Source::builder()
        .context(ExecutionContext::Synchronous)
        .warn_policy(WarnPolicy::DontWarn)
        .build()
}

pub fn recv<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(SETTLE_TIMEOUT)
        .expect("timed out waiting for a handler")
}

/// Serial queue that counts how many tasks were submitted to it.
pub struct CountingQueue {
    queue: SerialQueue,
    submitted: AtomicUsize,
}

impl CountingQueue {
    pub fn new(label: &str) -> Self {
        Self {
            queue: SerialQueue::new(label),
            submitted: AtomicUsize::new(0),
        }
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl Executor for CountingQueue {
    fn submit(&self, task: Task) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.queue.submit(task);
    }

    fn is_current(&self) -> bool {
        self.queue.is_current()
    }

    fn label(&self) -> &str {
        self.queue.label()
    }
}
