//! Offload synchronous work to the blocking thread pool.
//!
//! [`to_thread`] runs a closure on tokio's blocking pool and awaits its
//! result without stalling the async workers. The caller's current
//! [`tracing::Span`] is entered on the worker thread, so log output from the
//! closure stays attached to the request or task that spawned it.
//!
//! [`awaitable`] turns a synchronous function into one that returns a future,
//! using [`to_thread`] under the hood.
//!
//! # Examples
//!
//! ```
//! use async_toolbox::blocking::{awaitable, to_thread};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let sum = to_thread(|| (1..=10).sum::<u32>()).await.unwrap();
//! assert_eq!(sum, 55);
//!
//! let shout = awaitable(|s: String| s.to_uppercase());
//! assert_eq!(shout("hello world".to_string()).await.unwrap(), "HELLO WORLD");
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::Span;

use crate::error::{Result, TaskError};
use crate::scheduler::Scheduler;

/// Runs `f` on the current runtime's blocking pool and returns its result.
///
/// The span that is current when `to_thread` is *called* is entered around
/// `f`.
///
/// # Errors
///
/// - [`TaskError::Panicked`] if `f` panics.
/// - [`TaskError::Cancelled`] if the runtime shuts down before `f` runs.
///
/// # Panics
///
/// Panics if the returned future is polled outside of a tokio runtime.
pub fn to_thread<F, R>(f: F) -> impl Future<Output = Result<R>> + Send + 'static
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let span = Span::current();
    async move {
        tokio::task::spawn_blocking(move || span.in_scope(f))
            .await
            .map_err(TaskError::from_join)
    }
}

/// Runs `f` on `scheduler`'s blocking pool and returns its result.
///
/// Unlike [`to_thread`], the caller does not need to be inside the runtime
/// that executes `f`.
///
/// # Errors
///
/// Same as [`to_thread`].
pub async fn to_thread_on<F, R>(scheduler: &Scheduler, f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let span = Span::current();
    scheduler
        .spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(TaskError::from_join)
}

/// Converts a synchronous function into an asynchronous one.
///
/// Each call of the returned function runs `f` through [`to_thread`]. Use a
/// tuple for `A` to pass several arguments.
pub fn awaitable<A, R, F>(f: F) -> impl Fn(A) -> BoxFuture<'static, Result<R>> + Clone
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    let f = Arc::new(f);
    move |arg: A| {
        let f = Arc::clone(&f);
        Box::pin(to_thread(move || f(arg))) as BoxFuture<'static, Result<R>>
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[tokio::test]
    async fn runs_on_a_different_thread() {
        let caller = thread::current().id();
        let worker = to_thread(|| thread::current().id()).await.unwrap();
        assert_ne!(caller, worker);
    }

    #[tokio::test]
    async fn returns_closure_value() {
        let out = to_thread(|| "hello world").await.unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn panics_are_reported() {
        let err = to_thread(|| -> u8 { panic!("blocking boom") })
            .await
            .unwrap_err();
        match err {
            TaskError::Panicked(msg) => assert_eq!(msg, "blocking boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn awaitable_can_be_called_repeatedly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let add = awaitable(move |(a, b): (u32, u32)| {
            counter.fetch_add(1, Ordering::SeqCst);
            a + b
        });

        let again = add.clone();
        assert_eq!(add((1, 2)).await.unwrap(), 3);
        assert_eq!(again((20, 22)).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn to_thread_on_owned_scheduler() {
        let scheduler = Scheduler::current_thread().unwrap();
        let out = scheduler
            .block_on(to_thread_on(&scheduler, || 6 * 7))
            .unwrap();
        assert_eq!(out, 42);
    }
}
