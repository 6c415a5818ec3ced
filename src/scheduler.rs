//! Explicitly injected cooperative scheduler.
//!
//! A [`Scheduler`] is the single place where the crate touches a tokio
//! runtime. It is handed to [`CoroutineTask`](crate::task::CoroutineTask) and
//! friends at construction time instead of being looked up from ambient
//! process state, so the embedder always decides which runtime drives the
//! work.
//!
//! A scheduler either *owns* a runtime (built from a [`SchedulerConfig`] or
//! passed in) or *borrows* one through a [`Handle`]. Both can be cloned
//! cheaply; clones refer to the same runtime.
//!
//! # Examples
//!
//! ```
//! use async_toolbox::Scheduler;
//!
//! // Outside of any runtime: build an owned single-threaded one.
//! let scheduler = Scheduler::current_thread().unwrap();
//! assert!(!scheduler.caller_in_runtime());
//!
//! let value = scheduler.block_on(async { 40 + 2 });
//! assert_eq!(value, 42);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor as TokioFlavor};
use tokio::task::JoinHandle;

use crate::config::{RuntimeFlavor, SchedulerConfig};
use crate::error::{Result, TaskError};

/// Handle to the runtime that executes wrapped work.
#[derive(Clone)]
pub struct Scheduler {
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    Owned(Arc<OwnedRuntime>),
    Borrowed(Handle),
}

/// A runtime owned by one or more schedulers.
///
/// Dropped inside an async context, where tokio forbids blocking shutdown,
/// the runtime is shut down in the background instead.
struct OwnedRuntime {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl OwnedRuntime {
    fn new(runtime: Runtime) -> Self {
        Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.runtime {
            Some(runtime) => runtime.block_on(future),
            None => self.handle.block_on(future),
        }
    }
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            if Handle::try_current().is_ok() {
                tracing::debug!("owned runtime dropped in async context, shutting down in background");
                runtime.shutdown_background();
            }
        }
    }
}

impl Scheduler {
    /// Wraps a handle to a runtime owned elsewhere.
    ///
    /// When the handle belongs to a current-thread runtime, spawned work only
    /// makes progress while that runtime is being driven by its owner.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            kind: Kind::Borrowed(handle),
        }
    }

    /// Takes ownership of a runtime.
    ///
    /// The runtime is shut down when the last clone of this scheduler is
    /// dropped. Outside an async context the shutdown waits for spawned work
    /// to stop; inside one it happens in the background.
    pub fn from_runtime(runtime: Runtime) -> Self {
        Self {
            kind: Kind::Owned(Arc::new(OwnedRuntime::new(runtime))),
        }
    }

    /// Uses the runtime the caller is currently running on.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoScheduler`] if called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|_| TaskError::NoScheduler)
    }

    /// Builds an owned single-threaded runtime with all drivers enabled.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Runtime`] if the runtime cannot be built.
    pub fn current_thread() -> Result<Self> {
        Self::from_config(&SchedulerConfig::default())
    }

    /// Builds an owned runtime from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Runtime`] if the runtime cannot be built.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let mut builder = match config.flavor {
            RuntimeFlavor::CurrentThread => Builder::new_current_thread(),
            RuntimeFlavor::MultiThread => {
                let mut builder = Builder::new_multi_thread();
                if let Some(n) = config.worker_threads {
                    builder.worker_threads(n.max(1));
                }
                builder
            },
        };
        let runtime = builder
            .enable_all()
            .thread_name(config.thread_name.clone())
            .build()?;

        tracing::debug!(flavor = ?config.flavor, "built owned runtime");
        Ok(Self::from_runtime(runtime))
    }

    /// Uses the caller's runtime if there is one, otherwise builds an owned
    /// single-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Runtime`] if a runtime has to be built and fails.
    pub fn current_or_new() -> Result<Self> {
        match Self::current() {
            Ok(scheduler) => Ok(scheduler),
            Err(_) => Self::current_thread(),
        }
    }

    /// Returns a handle to the underlying runtime.
    pub fn handle(&self) -> Handle {
        match &self.kind {
            Kind::Owned(owned) => owned.handle.clone(),
            Kind::Borrowed(handle) => handle.clone(),
        }
    }

    /// Returns `true` if this scheduler owns its runtime.
    pub fn is_owned(&self) -> bool {
        matches!(self.kind, Kind::Owned(_))
    }

    /// Returns `true` if the calling thread is inside *any* tokio runtime
    /// context, i.e. something is already driving async execution.
    pub fn caller_in_runtime(&self) -> bool {
        Handle::try_current().is_ok()
    }

    /// Returns `true` if [`block_on`](Self::block_on) from a thread outside
    /// the runtime makes progress on spawned work.
    ///
    /// This is false only for a borrowed handle to a current-thread runtime:
    /// such a runtime is driven solely by its owner's `Runtime::block_on`.
    pub fn can_block_on(&self) -> bool {
        match &self.kind {
            Kind::Owned(_) => true,
            Kind::Borrowed(handle) => handle.runtime_flavor() != TokioFlavor::CurrentThread,
        }
    }

    /// Submits a future for execution on this scheduler.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match &self.kind {
            Kind::Owned(owned) => owned.handle.spawn(future),
            Kind::Borrowed(handle) => handle.spawn(future),
        }
    }

    /// Runs a blocking closure on this scheduler's blocking thread pool.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match &self.kind {
            Kind::Owned(owned) => owned.handle.spawn_blocking(f),
            Kind::Borrowed(handle) => handle.spawn_blocking(f),
        }
    }

    /// Drives the scheduler on the calling thread until `future` completes.
    ///
    /// Spawned work only advances meanwhile if [`can_block_on`](Self::can_block_on)
    /// holds.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async context, as tokio does.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.kind {
            Kind::Owned(owned) => owned.block_on(future),
            Kind::Borrowed(handle) => handle.block_on(future),
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Owned(_) => "owned",
            Kind::Borrowed(_) => "borrowed",
        };
        f.debug_struct("Scheduler")
            .field("kind", &kind)
            .field("flavor", &self.handle().runtime_flavor())
            .finish()
    }
}
