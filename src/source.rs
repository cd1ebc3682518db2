//! The producer side: a [`Source`] settles exactly once and hands its result
//! to every handler registered through the [`Promise`]s derived from it.
use crate::config::default_warn_policy;
use crate::context::ExecutionContext;
use crate::diagnostics::{Site, Trace, UnresolvedReport, WarnPolicy};
use crate::promise::Promise;
use crate::state::{Handler, Settled, State, StateCell};
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State shared by a source, its clones and its promises. Dropped when the
/// last of them goes away.
pub(crate) struct Shared<T, E> {
    cell: StateCell<T, E>,
    context: ExecutionContext,
    policy: WarnPolicy,
    trace: Trace,
    /// Sources made by operators only report once their upstream delivered.
    armed: AtomicBool,
}

impl<T, E> Shared<T, E> {
    pub(crate) fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub(crate) fn trace(&self) -> &Trace {
        &self.trace
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.cell.is_settled()
    }
}

impl<T, E> Shared<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn state(&self) -> State<T, E> {
        self.cell.read()
    }

    pub(crate) fn settle(self: &Arc<Self>, result: Result<T, E>) -> bool {
        let ok = result.is_ok();
        match self.cell.try_settle(result) {
            Some(settled) => {
                tracing::trace!(site = %self.trace.last(), ok, "settled");
                self.dispatch(settled);
                true
            }
            None => {
                tracing::debug!(site = %self.trace.last(), ok, "already settled, ignoring");
                false
            }
        }
    }

    pub(crate) fn subscribe(self: &Arc<Self>, handler: Handler<T, E>) {
        if let Some(settled) = self.cell.add_handler(handler) {
            self.dispatch(settled);
        }
    }

    /// Runs `settled` on this source's context as one task. Handlers that
    /// arrive while it is queued or running are drained by the same task.
    fn dispatch(self: &Arc<Self>, settled: Settled<T, E>) {
        if settled.handlers.is_empty() {
            return;
        }
        tracing::trace!(
            context = ?self.context,
            handlers = settled.handlers.len(),
            "dispatch"
        );
        let shared = self.clone();
        self.context.execute(Box::new(move || shared.drain(settled)));
    }

    fn drain(&self, settled: Settled<T, E>) {
        let Settled {
            result,
            mut handlers,
        } = settled;
        let _batch = BatchGuard(&self.cell);
        while !handlers.is_empty() {
            for handler in handlers {
                handler(result.clone());
            }
            handlers = self.cell.next_batch();
        }
    }
}

/// Releases the cell's batch if a handler unwinds out of [`Shared::drain`].
struct BatchGuard<'a, T, E>(&'a StateCell<T, E>);

impl<T, E> Drop for BatchGuard<'_, T, E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abandon_batch();
        }
    }
}

impl<T, E> Drop for Shared<T, E> {
    fn drop(&mut self) {
        if self.cell.is_settled() || !self.armed.load(Ordering::Acquire) {
            return;
        }
        self.policy.report(UnresolvedReport {
            trace: self.trace.clone(),
            value_type: type_name::<T>(),
            error_type: type_name::<E>(),
        });
    }
}

/// Producer handle. Clones share the same cell, so any number of threads may
/// race to settle it; the first call wins and the rest are ignored.
///
/// # Examples
///
/// ```
/// use promise_dispatch::{ExecutionContext, Source};
/// use std::thread;
///
/// let source = Source::<String, String>::with_context(ExecutionContext::Synchronous);
/// let promise = source.promise();
/// let task = thread::spawn(move || source.resolve("🍓".into()));
/// task.join().expect("The task thread has panicked");
/// assert_eq!(promise.current_value().as_deref(), Some("🍓"));
/// ```
pub struct Source<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Source<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Source<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Unresolved source on the default context.
    #[track_caller]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[track_caller]
    pub fn with_context(context: ExecutionContext) -> Self {
        Self::builder().context(context).build()
    }

    /// Source that is already settled with `result`.
    #[track_caller]
    pub fn pre_settled(result: Result<T, E>, context: ExecutionContext) -> Self {
        Self::builder().context(context).build_settled(result)
    }

    #[track_caller]
    pub fn builder() -> SourceBuilder<T, E> {
        SourceBuilder::new(Site::caller())
    }

    pub fn resolve(&self, value: T) {
        self.shared.settle(Ok(value));
    }

    pub fn reject(&self, err: E) {
        self.shared.settle(Err(err));
    }

    /// Settles with `result`; `false` if the source had already settled.
    pub fn settle(&self, result: Result<T, E>) -> bool {
        self.shared.settle(result)
    }

    pub fn promise(&self) -> Promise<T, E> {
        Promise::from_shared(self.shared.clone())
    }

    /// A fresh source fed by an operator on `upstream`. It is not reported as
    /// abandoned until [`Source::arm`] says the upstream has delivered.
    pub(crate) fn derived<U, F>(
        upstream: &Shared<U, F>,
        context: ExecutionContext,
        site: Site,
    ) -> Self {
        Self::from_parts(
            StateCell::new(),
            context,
            upstream.policy.clone(),
            upstream.trace.then(site),
            false,
        )
    }

    /// Output of a combinator over several promises; never reported.
    pub(crate) fn combined(context: ExecutionContext, site: Site) -> Self {
        Self::from_parts(
            StateCell::new(),
            context,
            WarnPolicy::DontWarn,
            Trace::new(site),
            false,
        )
    }

    pub(crate) fn arm(&self) {
        self.shared.armed.store(true, Ordering::Release);
    }

    fn from_parts(
        cell: StateCell<T, E>,
        context: ExecutionContext,
        policy: WarnPolicy,
        trace: Trace,
        armed: bool,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cell,
                context,
                policy,
                trace,
                armed: AtomicBool::new(armed),
            }),
        }
    }
}

impl<T, E> Source<T, E> {
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

impl<T, E> Default for Source<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Source<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("settled", &self.is_settled())
            .field("context", self.context())
            .field("site", self.trace().last())
            .finish()
    }
}

/// Per-source overrides of the process-wide defaults.
#[derive(Debug)]
pub struct SourceBuilder<T, E> {
    site: Site,
    context: ExecutionContext,
    policy: Option<WarnPolicy>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> SourceBuilder<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new(site: Site) -> Self {
        Self {
            site,
            context: ExecutionContext::default(),
            policy: None,
            _marker: PhantomData,
        }
    }

    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn warn_policy(mut self, policy: WarnPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Names the creation site in unresolved-drop reports.
    pub fn label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.site = self.site.with_label(label);
        self
    }

    pub fn build(self) -> Source<T, E> {
        self.finish(StateCell::new())
    }

    pub fn build_settled(self, result: Result<T, E>) -> Source<T, E> {
        self.finish(StateCell::with_state(State::from(result)))
    }

    fn finish(self, cell: StateCell<T, E>) -> Source<T, E> {
        let policy = self.policy.unwrap_or_else(default_warn_policy);
        Source::from_parts(cell, self.context, policy, Trace::new(self.site), true)
    }
}
