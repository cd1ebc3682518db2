//! A serial queue runs tasks one at a time, in submission order, on its own
//! worker thread. The worker is fed by a multi-producer channel, so the queue
//! handle can be shared freely while only the worker consumes.
//!
use crate::context::{Executor, Task};
use std::{
    cell::Cell,
    io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{channel, Sender},
    },
    thread,
};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_QUEUE: Cell<u64> = const { Cell::new(0) };
}

#[derive(Debug)]
pub struct SerialQueue {
    id: u64,
    label: String,
    sender: Sender<Task>,
}

impl SerialQueue {
    /// Starts a queue with a dedicated worker thread named after `label`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread, like
    /// [`std::thread::spawn`]. Use [`SerialQueue::try_new`] to handle that.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        match Self::try_new(label.clone()) {
            Ok(queue) => queue,
            Err(err) => panic!("failed to start serial queue `{label}`: {err}"),
        }
    }

    pub fn try_new(label: impl Into<String>) -> io::Result<Self> {
        let label = label.into();
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel::<Task>();
        let worker_label = label.clone();
        thread::Builder::new()
            .name(format!("queue-{label}"))
            .spawn(move || {
                CURRENT_QUEUE.with(|current| current.set(id));
                // Ends once every handle has been dropped and the backlog is empty.
                for task in receiver {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!(queue = %worker_label, "task panicked");
                    }
                }
                tracing::trace!(queue = %worker_label, "queue drained");
            })?;
        Ok(Self { id, label, sender })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Executor for SerialQueue {
    fn submit(&self, task: Task) {
        if self.sender.send(task).is_err() {
            tracing::warn!(queue = %self.label, "worker gone, task dropped");
        }
    }

    fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| current.get() == self.id)
    }

    fn label(&self) -> &str {
        &self.label
    }
}
