//! Crossing between promises and `async`/`.await`.
//!
//! A [`Promise`] turns into a [`PromiseFuture`] through [`IntoFuture`], and a
//! `Future<Output = Result<T, E>>` turns into a promise with
//! [`spawn_promise`].
use crate::promise::Promise;
use crate::source::Source;
use crate::Error;
use futures::task::{Spawn, SpawnExt};
use parking_lot::Mutex;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

struct Inner<T, E> {
    value: Option<Result<T, E>>,
    waker: Result<Waker, WakerState>,
}

/// Handed to the promise as its handler. If the promise's source is dropped
/// unresolved the handler is dropped unused, which taints the slot.
struct Completer<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Completer<T, E> {
    fn complete(self, result: Result<T, E>) {
        self.inner.lock().value = Some(result);
        // `Drop` does the waking.
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Ok(waker) = std::mem::replace(&mut inner.waker, Err(WakerState::Tainted)) {
            waker.wake()
        }
    }
}

/// Resolves with the promise's result, or [`Error::SourceDropped`] if nothing
/// is left that could ever settle it.
///
/// # Examples
///
/// ```
/// use promise_dispatch::{ExecutionContext, Source};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let source = Source::<String, String>::with_context(ExecutionContext::Synchronous);
/// let promise = source.promise();
/// let task1 = thread::spawn(move || block_on(async {
///     promise.await
/// }));
/// source.resolve("Hi".into());
/// let received = task1.join().expect("The task1 thread has panicked.");
/// assert_eq!(received.unwrap(), Ok("Hi".to_string()));
/// ```
pub struct PromiseFuture<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Future for PromiseFuture<T, E> {
    type Output = Result<Result<T, E>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock();
        match inner.value.take() {
            Some(value) => Poll::Ready(Ok(value)),
            None => match std::mem::replace(&mut inner.waker, Ok(cx.waker().clone())) {
                Err(WakerState::Tainted) => Poll::Ready(Err(Error::SourceDropped)),
                _ => Poll::Pending,
            },
        }
    }
}

impl<T, E> fmt::Debug for PromiseFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PromiseFuture")
            .field("ready", &inner.value.is_some())
            .field("waker", &inner.waker.as_ref().err())
            .finish()
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<Result<T, E>, Error>;
    type IntoFuture = PromiseFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        let inner = Arc::new(Mutex::new(Inner {
            value: None,
            waker: Err(WakerState::Fresh),
        }));
        let completer = Completer {
            inner: inner.clone(),
        };
        self.on_result(move |result| completer.complete(result));
        PromiseFuture { inner }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Blocks the current thread until the promise settles.
    ///
    /// Do not call this from the thread that has to run the promise's
    /// handlers (for example the default `main` queue when the promise uses
    /// [`ExecutionContext::Unspecified`](crate::ExecutionContext::Unspecified)):
    /// it would wait for itself.
    ///
    /// Takes the promise by value so that, if every source behind it is
    /// gone, the wait ends with [`Error::SourceDropped`] instead of hanging.
    pub fn wait(self) -> Result<Result<T, E>, Error> {
        futures::executor::block_on(self.into_future())
    }
}

/// Runs `future` on `spawner` and returns a promise for its output.
///
/// If the spawner refuses the task the promise rejects with
/// [`Error::Spawn`] converted into `E`.
#[track_caller]
pub fn spawn_promise<S, F, T, E>(spawner: &S, future: F) -> Promise<T, E>
where
    S: Spawn + ?Sized,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + From<Error> + 'static,
{
    let source = Source::new();
    let promise = source.promise();
    let producer = source.clone();
    if let Err(err) = spawner.spawn(async move {
        producer.settle(future.await);
    }) {
        tracing::warn!(%err, "spawn refused, rejecting promise");
        source.reject(E::from(Error::Spawn(err)));
    }
    promise
}
