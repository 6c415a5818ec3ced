//! Entry point capabilities and lifecycle callbacks.
//!
//! The work a [`CoroutineTask`](super::CoroutineTask) runs is supplied
//! explicitly as an [`EntryPoint`]. Any `Fn() -> impl Future` closure
//! qualifies; types that carry their own state can implement [`Coroutine`]
//! instead and be wrapped with [`CoroutineEntry`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

/// A restartable asynchronous entry point producing `T`.
///
/// Each call produces a fresh future; the task calls it once per run.
pub trait EntryPoint<T>: Send + Sync + 'static {
    /// Creates the future for one run.
    fn call(&self) -> BoxFuture<'static, anyhow::Result<T>>;
}

impl<T, F, Fut> EntryPoint<T> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    fn call(&self) -> BoxFuture<'static, anyhow::Result<T>> {
        Box::pin(self())
    }
}

/// A stateful type with an async entry method.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use async_toolbox::task::Coroutine;
///
/// struct Greeter {
///     name: String,
/// }
///
/// #[async_trait]
/// impl Coroutine for Greeter {
///     type Output = String;
///
///     async fn entry(self: Arc<Self>) -> anyhow::Result<String> {
///         Ok(format!("hello {}", self.name))
///     }
/// }
/// ```
#[async_trait]
pub trait Coroutine: Send + Sync + 'static {
    /// Value produced by a successful run.
    type Output: Send + 'static;

    /// Runs the coroutine once.
    async fn entry(self: Arc<Self>) -> anyhow::Result<Self::Output>;
}

/// Adapts a [`Coroutine`] into an [`EntryPoint`].
pub struct CoroutineEntry<C>(Arc<C>);

impl<C: Coroutine> CoroutineEntry<C> {
    /// Wraps a shared coroutine.
    pub fn new(coroutine: Arc<C>) -> Self {
        Self(coroutine)
    }

    /// Returns the wrapped coroutine.
    pub fn coroutine(&self) -> &Arc<C> {
        &self.0
    }
}

impl<C: Coroutine> EntryPoint<C::Output> for CoroutineEntry<C> {
    fn call(&self) -> BoxFuture<'static, anyhow::Result<C::Output>> {
        let coroutine = Arc::clone(&self.0);
        Box::pin(async move { coroutine.entry().await })
    }
}

/// Lifecycle callback fired on start or end of a run.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        start: u32,
    }

    #[async_trait]
    impl Coroutine for Counter {
        type Output = u32;

        async fn entry(self: Arc<Self>) -> anyhow::Result<u32> {
            tokio::task::yield_now().await;
            Ok(self.start + 1)
        }
    }

    #[tokio::test]
    async fn closures_are_entry_points() {
        let entry = || async { Ok::<_, anyhow::Error>("closure") };
        assert_eq!(entry.call().await.unwrap(), "closure");
        // Each call is a fresh run.
        assert_eq!(entry.call().await.unwrap(), "closure");
    }

    #[tokio::test]
    async fn coroutine_adapter_calls_entry() {
        let entry = CoroutineEntry::new(Arc::new(Counter { start: 41 }));
        assert_eq!(entry.call().await.unwrap(), 42);
        assert_eq!(entry.coroutine().start, 41);
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let entry = || async { Err::<u8, _>(anyhow::anyhow!("nope")) };
        let err = entry.call().await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
