//! Aggregating several promises into one.
//!
//! The output promise runs its handlers on the context of the first input
//! (or inline when there is no input). Inputs may settle on any thread in any
//! order; each combinator keeps its bookkeeping behind one lock and leaves
//! the exactly-once part to the output source.
use crate::context::ExecutionContext;
use crate::diagnostics::Site;
use crate::promise::Promise;
use crate::source::Source;
use crate::Never;
use futures::future::Either;
use parking_lot::Mutex;
use std::sync::Arc;

fn output_context<T, E>(promises: &[Promise<T, E>]) -> ExecutionContext {
    promises
        .first()
        .map(|first| first.context().clone())
        .unwrap_or(ExecutionContext::Synchronous)
}

/// `promise.flatten()` as a free function.
#[track_caller]
pub fn flatten<T, E>(promise: &Promise<Promise<T, E>, E>) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    promise.flatten()
}

/// All values, in input order, once every input has resolved. The first
/// error to arrive wins; later errors are dropped.
///
/// An empty input resolves immediately with an empty `Vec`.
#[track_caller]
pub fn join_all<T, E, I>(promises: I) -> Promise<Vec<T>, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    let site = Site::caller();
    if promises.is_empty() {
        return Source::pre_settled(Ok(Vec::new()), ExecutionContext::Synchronous).promise();
    }

    let output = Source::combined(output_context(&promises), site.with_label("join_all"));
    let slots = Arc::new(Mutex::new(JoinSlots {
        values: vec![None; promises.len()],
        remaining: promises.len(),
    }));
    for (index, promise) in promises.iter().enumerate() {
        let output = output.clone();
        let slots = slots.clone();
        promise.on_result(move |result| match result {
            Ok(value) => {
                let collected = slots.lock().fill(index, value);
                if let Some(values) = collected {
                    output.resolve(values);
                }
            }
            Err(err) => output.reject(err),
        });
    }
    output.promise()
}

struct JoinSlots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

impl<T> JoinSlots<T> {
    /// Stores one value; hands back all of them once the last slot fills.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        if self.values[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        self.values.iter_mut().map(Option::take).collect()
    }
}

/// The first value to arrive, in completion order. Rejects with the last
/// error only after every input has rejected.
///
/// An empty input never settles; race it against a timeout if that matters.
#[track_caller]
pub fn race_any<T, E, I>(promises: I) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    let output = Source::combined(
        output_context(&promises),
        Site::caller().with_label("race_any"),
    );
    let total = promises.len();
    let failures = Arc::new(Mutex::new(0usize));
    for promise in &promises {
        let output = output.clone();
        let failures = failures.clone();
        promise.on_result(move |result| match result {
            Ok(value) => output.resolve(value),
            Err(err) => {
                let all_failed = {
                    let mut failures = failures.lock();
                    *failures += 1;
                    *failures == total
                };
                if all_failed {
                    output.reject(err);
                }
            }
        });
    }
    output.promise()
}

/// Races two promises of the same type.
#[track_caller]
pub fn join_either<T, E>(first: &Promise<T, E>, second: &Promise<T, E>) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    race_any([first.clone(), second.clone()])
}

/// Races two promises of different types, tagging the winner.
#[track_caller]
pub fn race_either<A, B, E>(left: &Promise<A, E>, right: &Promise<B, E>) -> Promise<Either<A, B>, E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    race_any([left.map(Either::Left), right.map(Either::Right)])
}

/// Resolves once every input has settled, whatever the outcome. An empty
/// input resolves immediately.
#[track_caller]
pub fn finalize_all<T, E, I>(promises: I) -> Promise<(), Never>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    if promises.is_empty() {
        return Source::pre_settled(Ok(()), ExecutionContext::Synchronous).promise();
    }

    let output = Source::combined(
        output_context(&promises),
        Site::caller().with_label("finalize_all"),
    );
    let remaining = Arc::new(Mutex::new(promises.len()));
    for promise in &promises {
        let output = output.clone();
        let remaining = remaining.clone();
        promise.on_settled(move || {
            let done = {
                let mut remaining = remaining.lock();
                *remaining -= 1;
                *remaining == 0
            };
            if done {
                output.resolve(());
            }
        });
    }
    output.promise()
}

/// Resolves as soon as any input settles. An empty input never settles.
#[track_caller]
pub fn finalize_any<T, E, I>(promises: I) -> Promise<(), Never>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    let output = Source::combined(
        output_context(&promises),
        Site::caller().with_label("finalize_any"),
    );
    for promise in &promises {
        let output = output.clone();
        promise.on_settled(move || output.resolve(()));
    }
    output.promise()
}
