//! Write-once promises whose callbacks run where you ask them to.
//!
//! A [`Source`] is settled exactly once by whoever produces the value; any
//! number of [`Promise`]s read it, register handlers and derive new promises
//! with [`map`](Promise::map), [`flat_map`](Promise::flat_map) and friends.
//! Each source is bound to an [`ExecutionContext`] that decides which thread
//! runs its handlers.
//!
//! # Examples
//!
//! ```
//! use promise_dispatch::{join_all, ExecutionContext, Promise, Source};
//!
//! let source = Source::<u32, String>::with_context(ExecutionContext::Synchronous);
//! let both = join_all([source.promise(), Promise::resolved(2)]);
//! source.resolve(1);
//! assert_eq!(both.current_value(), Some(vec![1, 2]));
//! ```
use thiserror::Error;

pub mod bridge;
pub mod combinators;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod promise;
pub mod queue;
pub mod source;
pub mod state;
pub mod timer;

pub use bridge::{spawn_promise, PromiseFuture};
pub use combinators::{
    finalize_all, finalize_any, flatten, join_all, join_either, race_any, race_either,
};
pub use config::{default_warn_policy, set_default_warn_policy};
pub use context::{default_executor, install_default_executor, ExecutionContext, Executor, Task};
pub use diagnostics::{Site, Trace, UnresolvedReport, WarnPolicy};
pub use futures::future::Either;
pub use promise::Promise;
pub use queue::SerialQueue;
pub use source::{Source, SourceBuilder};
pub use state::State;
pub use timer::{ThreadTimer, Timer};

/// Error type of a promise that cannot fail.
pub use std::convert::Infallible as Never;

/// Failures of the machinery itself. Errors of the work being promised travel
/// in the promise's own `E`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("source was dropped before it settled")]
    SourceDropped,
    #[error("a default executor is already installed")]
    DefaultExecutorInstalled,
    #[error("failed to spawn promise task: {0}")]
    Spawn(#[from] futures::task::SpawnError),
}
