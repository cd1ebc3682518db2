//! The write-once cell shared by a [`Source`](crate::Source) and every
//! [`Promise`](crate::Promise) looking at it.
//!
//! One lock guards both the state and the pending handler list. The lock is
//! never held while a handler runs: [`StateCell::try_settle`] and
//! [`StateCell::add_handler`] hand back a [`Settled`] batch that the caller
//! runs after the guard is gone.
//!
//! At most one batch is out at a time. Handlers registered after settlement
//! while a batch is still queued or running are appended to the cell and
//! picked up by that batch through [`StateCell::next_batch`], so they can
//! never overtake handlers registered before them.
use parking_lot::Mutex;
use std::fmt;

/// A callback waiting for the cell to settle.
pub type Handler<T, E> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

/// Where a cell is in its lifecycle. Once it leaves `Unresolved` it never
/// changes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T, E> {
    Unresolved,
    Resolved(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    pub fn is_settled(&self) -> bool {
        !matches!(self, State::Unresolved)
    }

    /// The terminal result, or `None` while unresolved.
    pub fn as_result(&self) -> Option<Result<&T, &E>> {
        match self {
            State::Unresolved => None,
            State::Resolved(value) => Some(Ok(value)),
            State::Rejected(err) => Some(Err(err)),
        }
    }
}

impl<T: Clone, E: Clone> State<T, E> {
    pub fn to_result(&self) -> Option<Result<T, E>> {
        self.as_result()
            .map(|result| result.map(T::clone).map_err(E::clone))
    }
}

impl<T, E> From<Result<T, E>> for State<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => State::Resolved(value),
            Err(err) => State::Rejected(err),
        }
    }
}

/// Handlers to run, in registration order, with the result they should see.
pub struct Settled<T, E> {
    pub result: Result<T, E>,
    pub handlers: Vec<Handler<T, E>>,
}

impl<T, E> fmt::Debug for Settled<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settled")
            .field("ok", &self.result.is_ok())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

struct Inner<T, E> {
    state: State<T, E>,
    handlers: Vec<Handler<T, E>>,
    /// A batch has been handed out and has not yet come back empty.
    draining: bool,
}

/// Thread-safe, exactly-once settable state holder.
pub struct StateCell<T, E> {
    inner: Mutex<Inner<T, E>>,
}

impl<T, E> StateCell<T, E> {
    pub fn new() -> Self {
        Self::with_state(State::Unresolved)
    }

    pub fn with_state(state: State<T, E>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                handlers: Vec::new(),
                draining: false,
            }),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().state.is_settled()
    }

    /// Number of handlers waiting for the cell to settle, or for the batch
    /// in flight to reach them.
    pub fn pending_handlers(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    /// Handlers queued behind the batch in flight, in registration order.
    /// An empty result ends the batch: the next late handler starts a new one.
    pub fn next_batch(&self) -> Vec<Handler<T, E>> {
        let mut inner = self.inner.lock();
        let handlers = std::mem::take(&mut inner.handlers);
        if handlers.is_empty() {
            inner.draining = false;
        }
        handlers
    }

    /// Gives up on the batch in flight without taking its queued handlers;
    /// the next late registration picks them up.
    pub fn abandon_batch(&self) {
        self.inner.lock().draining = false;
    }
}

impl<T: Clone, E: Clone> StateCell<T, E> {
    pub fn read(&self) -> State<T, E> {
        self.inner.lock().state.clone()
    }

    /// Settles the cell if it is still unresolved and takes the pending
    /// handlers with it. Returns `None` if somebody else settled first.
    pub fn try_settle(&self, result: Result<T, E>) -> Option<Settled<T, E>> {
        let mut inner = self.inner.lock();
        if inner.state.is_settled() {
            return None;
        }
        inner.state = State::from(result.clone());
        let handlers = std::mem::take(&mut inner.handlers);
        inner.draining = !handlers.is_empty();
        Some(Settled { result, handlers })
    }

    /// Queues `handler` while unresolved or while a batch is in flight.
    /// Otherwise the handler comes back as a new batch with the known result,
    /// together with anything left behind by an abandoned batch.
    pub fn add_handler(&self, handler: Handler<T, E>) -> Option<Settled<T, E>> {
        let mut inner = self.inner.lock();
        inner.handlers.push(handler);
        if inner.draining {
            return None;
        }
        // Still unresolved: `try_settle` takes it.
        let result = inner.state.to_result()?;
        inner.draining = true;
        Some(Settled {
            result,
            handlers: std::mem::take(&mut inner.handlers),
        })
    }
}

impl<T, E> Default for StateCell<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for StateCell<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StateCell")
            .field("state", &inner.state)
            .field("handlers", &inner.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Handler<i32, String> {
        let log = log.clone();
        Box::new(move |result: Result<i32, String>| {
            log.lock().unwrap().push(format!("{tag}:{result:?}"))
        })
    }

    #[test]
    fn first_settle_wins() {
        let cell = StateCell::<i32, String>::new();
        assert!(cell.try_settle(Ok(1)).is_some());
        assert!(cell.try_settle(Err("x".into())).is_none());
        assert!(cell.try_settle(Ok(2)).is_none());
        assert_eq!(cell.read(), State::Resolved(1));
    }

    #[test]
    fn settle_drains_handlers_in_order() {
        let log = Arc::new(Mutex::new(vec![]));
        let cell = StateCell::<i32, String>::new();
        assert!(cell.add_handler(recorder(&log, "a")).is_none());
        assert!(cell.add_handler(recorder(&log, "b")).is_none());
        assert_eq!(cell.pending_handlers(), 2);

        let settled = cell.try_settle(Ok(7)).unwrap();
        assert_eq!(cell.pending_handlers(), 0);
        for handler in settled.handlers {
            handler(settled.result.clone());
        }
        assert_eq!(*log.lock().unwrap(), vec!["a:Ok(7)", "b:Ok(7)"]);
    }

    #[test]
    fn late_handler_comes_back_with_result() {
        let log = Arc::new(Mutex::new(vec![]));
        let cell = StateCell::<i32, String>::with_state(State::Rejected("boom".into()));
        let settled = cell.add_handler(recorder(&log, "late")).unwrap();
        assert_eq!(settled.result, Err("boom".to_string()));
        assert_eq!(settled.handlers.len(), 1);
        assert_eq!(cell.pending_handlers(), 0);
    }

    #[test]
    fn late_handlers_queue_behind_batch_in_flight() {
        let log = Arc::new(Mutex::new(vec![]));
        let cell = StateCell::<i32, String>::new();
        assert!(cell.add_handler(recorder(&log, "a")).is_none());
        let first = cell.try_settle(Ok(3)).unwrap();

        // Batch `first` has not run yet.
        assert!(cell.add_handler(recorder(&log, "b")).is_none());
        assert!(cell.add_handler(recorder(&log, "c")).is_none());
        assert_eq!(cell.pending_handlers(), 2);

        for handler in first.handlers {
            handler(first.result.clone());
        }
        for handler in cell.next_batch() {
            handler(Ok(3));
        }
        assert!(cell.next_batch().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["a:Ok(3)", "b:Ok(3)", "c:Ok(3)"]);

        // Nothing in flight any more, so a late handler starts its own batch.
        let again = cell.add_handler(recorder(&log, "d")).unwrap();
        assert_eq!(again.handlers.len(), 1);
    }

    #[test]
    fn abandoned_batch_leftovers_join_next_registration() {
        let log = Arc::new(Mutex::new(vec![]));
        let cell = StateCell::<i32, String>::with_state(State::Resolved(1));
        let _lost = cell.add_handler(recorder(&log, "a")).unwrap();
        assert!(cell.add_handler(recorder(&log, "b")).is_none());
        cell.abandon_batch();

        let settled = cell.add_handler(recorder(&log, "c")).unwrap();
        for handler in settled.handlers {
            handler(settled.result.clone());
        }
        assert_eq!(*log.lock().unwrap(), vec!["b:Ok(1)", "c:Ok(1)"]);
    }

    #[test]
    fn concurrent_settle_has_one_winner() {
        let cell = Arc::new(StateCell::<usize, String>::new());
        let winners: usize = (0..8)
            .map(|i| {
                let cell = cell.clone();
                thread::spawn(move || cell.try_settle(Ok(i)).is_some() as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|task| task.join().expect("settle thread panicked"))
            .sum();
        assert_eq!(winners, 1);
        assert!(cell.is_settled());
    }
}
