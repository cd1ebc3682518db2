//! The consumer side. A [`Promise`] is a read-only view over a
//! [`Source`]; registering on it never allocates, transforming it allocates
//! exactly one new source fed from this one.
use crate::context::ExecutionContext;
use crate::diagnostics::{Site, Trace};
use crate::source::{Shared, Source};
use crate::state::State;
use crate::timer::{default_timer, Timer};
use crate::Never;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A value that will be available later, or an error explaining why not.
///
/// Clones look at the same source, so a promise can fan out to any number of
/// consumers.
///
/// # Examples
///
/// ```
/// use promise_dispatch::{ExecutionContext, Source};
///
/// let source = Source::<u32, String>::with_context(ExecutionContext::Synchronous);
/// let doubled = source.promise().map(|v| v * 2);
/// source.resolve(21);
/// assert_eq!(doubled.current_value(), Some(42));
/// ```
pub struct Promise<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Promise<T, E> {
    pub(crate) fn from_shared(shared: Arc<Shared<T, E>>) -> Self {
        Self { shared }
    }

    pub fn is_settled(&self) -> bool {
        self.shared.is_settled()
    }

    pub fn context(&self) -> &ExecutionContext {
        self.shared.context()
    }

    pub fn trace(&self) -> &Trace {
        self.shared.trace()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Already resolved. Handlers run inline on the registering thread.
    #[track_caller]
    pub fn resolved(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    /// Already rejected. Handlers run inline on the registering thread.
    #[track_caller]
    pub fn rejected(err: E) -> Self {
        Self::from_result(Err(err))
    }

    #[track_caller]
    pub fn from_result(result: Result<T, E>) -> Self {
        Source::pre_settled(result, ExecutionContext::Synchronous).promise()
    }

    // -- snapshots -------------------------------------------------------

    pub fn state(&self) -> State<T, E> {
        self.shared.state()
    }

    pub fn current_result(&self) -> Option<Result<T, E>> {
        self.state().to_result()
    }

    pub fn current_value(&self) -> Option<T> {
        match self.state() {
            State::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn current_error(&self) -> Option<E> {
        match self.state() {
            State::Rejected(err) => Some(err),
            _ => None,
        }
    }

    // -- registration ----------------------------------------------------

    pub fn on_result<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        self.shared.subscribe(Box::new(f));
        self
    }

    pub fn on_value<F>(&self, f: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_result(move |result| {
            if let Ok(value) = result {
                f(value);
            }
        })
    }

    pub fn on_error<F>(&self, f: F) -> &Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.on_result(move |result| {
            if let Err(err) = result {
                f(err);
            }
        })
    }

    pub fn on_settled<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_result(move |_| f())
    }

    // -- transformation --------------------------------------------------

    #[track_caller]
    pub fn map<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.map_result(move |result| result.map(f))
    }

    #[track_caller]
    pub fn map_error<G, F>(&self, f: F) -> Promise<T, G>
    where
        G: Clone + Send + 'static,
        F: FnOnce(E) -> G + Send + 'static,
    {
        self.map_result(move |result| result.map_err(f))
    }

    #[track_caller]
    pub fn map_result<U, G, F>(&self, f: F) -> Promise<U, G>
    where
        U: Clone + Send + 'static,
        G: Clone + Send + 'static,
        F: FnOnce(Result<T, E>) -> Result<U, G> + Send + 'static,
    {
        let downstream = self.derive(self.context().clone(), Site::caller());
        let source = downstream.clone();
        self.shared.subscribe(Box::new(move |result: Result<T, E>| {
            source.settle(f(result));
        }));
        downstream.promise()
    }

    /// Chains an asynchronous step. Errors skip `f` and pass straight through.
    #[track_caller]
    pub fn flat_map<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U, E> + Send + 'static,
    {
        self.flat_map_result(move |result| match result {
            Ok(value) => f(value),
            Err(err) => Promise::rejected(err),
        })
    }

    /// Recovers from an error with another asynchronous step.
    #[track_caller]
    pub fn flat_map_error<G, F>(&self, f: F) -> Promise<T, G>
    where
        G: Clone + Send + 'static,
        F: FnOnce(E) -> Promise<T, G> + Send + 'static,
    {
        self.flat_map_result(move |result| match result {
            Ok(value) => Promise::resolved(value),
            Err(err) => f(err),
        })
    }

    #[track_caller]
    pub fn flat_map_result<U, G, F>(&self, f: F) -> Promise<U, G>
    where
        U: Clone + Send + 'static,
        G: Clone + Send + 'static,
        F: FnOnce(Result<T, E>) -> Promise<U, G> + Send + 'static,
    {
        let downstream = self.derive(self.context().clone(), Site::caller());
        let source = downstream.clone();
        self.shared.subscribe(Box::new(move |result: Result<T, E>| {
            // From here on only the inner promise can hold us up.
            source.arm();
            f(result).forward_to(source);
        }));
        downstream.promise()
    }

    /// Same result, but handlers registered on the returned promise run on
    /// `context`.
    #[track_caller]
    pub fn bind_context(&self, context: ExecutionContext) -> Promise<T, E> {
        let downstream = self.derive(context, Site::caller());
        self.forward_to(downstream.clone());
        downstream.promise()
    }

    /// Settles with the same result `duration` after this one settles, using
    /// a [`ThreadTimer`](crate::ThreadTimer) and this promise's context.
    #[track_caller]
    pub fn delay(&self, duration: Duration) -> Promise<T, E> {
        self.delay_on(duration, self.context().clone(), default_timer())
    }

    #[track_caller]
    pub fn delay_on(
        &self,
        duration: Duration,
        context: ExecutionContext,
        timer: Arc<dyn Timer>,
    ) -> Promise<T, E> {
        let site = Site::caller();
        self.flat_map_result(move |result| {
            let delayed = Source::<T, E>::builder()
                .context(context.clone())
                .label(format!("delay {duration:?} from {site}"))
                .build();
            let promise = delayed.promise();
            timer.schedule(
                duration,
                context,
                Box::new(move || {
                    delayed.settle(result);
                }),
            );
            promise
        })
    }

    fn forward_to(&self, source: Source<T, E>) {
        self.shared.subscribe(Box::new(move |result: Result<T, E>| {
            source.settle(result);
        }));
    }

    fn derive<U, G>(&self, context: ExecutionContext, site: Site) -> Source<U, G>
    where
        U: Clone + Send + 'static,
        G: Clone + Send + 'static,
    {
        Source::derived(&*self.shared, context, site)
    }
}

impl<T, E> Promise<Promise<T, E>, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    #[track_caller]
    pub fn flatten(&self) -> Promise<T, E> {
        self.flat_map(|inner| inner)
    }
}

impl<T> Promise<T, Never>
where
    T: Clone + Send + 'static,
{
    /// Widens a promise that cannot fail to any error type.
    #[track_caller]
    pub fn into_fallible<E>(&self) -> Promise<T, E>
    where
        E: Clone + Send + 'static,
    {
        self.map_error(|never| match never {})
    }

    /// The value, if it has arrived. There is no error branch to check.
    pub fn value(&self) -> Option<T> {
        self.current_value()
    }
}

impl<T: fmt::Debug + Clone + Send + 'static, E: fmt::Debug + Clone + Send + 'static> fmt::Debug
    for Promise<T, E>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .field("context", self.context())
            .field("site", self.trace().last())
            .finish()
    }
}
