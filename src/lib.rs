//! Cancellable task lifecycles over a tokio scheduler.
//!
//! The central type is [`CoroutineTask`], which wraps a restartable async
//! entry point and gives it a small, predictable lifecycle: start, stop,
//! await, and scoped enter/exit with guaranteed cancellation on the way out.
//! Starting is idempotent while a run is outstanding, stopping is always
//! safe, and the end callback fires exactly once per run.
//!
//! # Overview
//!
//! A task moves through `idle -> running -> completed/failed/cancelled`. A
//! cancelled task may be started again, which begins a new run; results
//! from superseded runs are discarded. Completed and failed runs are final.
//!
//! Work is placed on an explicitly supplied [`Scheduler`]. When the caller is
//! not inside a runtime, [`CoroutineTask::start`] can block until the run
//! settles (see [`TaskConfig::block_outside_runtime`]).
//!
//! # Module Organization
//!
//! - [`task`] - The task lifecycle wrapper, entry points and scopes
//! - [`scheduler`] - Runtime injection and blocking fallback
//! - [`blocking`] - Offloading synchronous work to the blocking pool
//! - [`cache`] - Memoisation of async computations
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use async_toolbox::{CoroutineTask, Scheduler, TaskStatus};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let task = CoroutineTask::new(Scheduler::current().unwrap(), || async {
//!     Ok::<_, anyhow::Error>("done")
//! });
//!
//! assert_eq!(task.wait().await.unwrap(), Some("done"));
//! assert_eq!(task.status(), TaskStatus::Completed);
//! # });
//! ```

pub mod blocking;
pub mod cache;
pub mod config;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod scheduler;
pub mod task;

// Re-exports for ergonomic access
pub use blocking::{awaitable, to_thread, to_thread_on};
pub use cache::{CacheStats, FutureCache};
pub use config::{CacheConfig, RuntimeFlavor, SchedulerConfig, TaskConfig, ToolboxConfig};
pub use error::{ConfigError, Result, TaskError};
#[cfg(feature = "logging")]
pub use logging::init_logging;
pub use scheduler::Scheduler;
pub use task::{
    Coroutine, CoroutineEntry, CoroutineTask, EntryPoint, ScopeExit, TaskBuilder, TaskScope,
    TaskSnapshot, TaskStatus,
};
