//! Start/stop/await lifecycle wrapper around a single async entry point.
//!
//! [`CoroutineTask`] owns at most one outstanding *run* of its entry point at
//! a time. It can be driven from synchronous code (where [`start`] blocks
//! until the run finishes) and from async code (where [`start`] returns
//! immediately and the run proceeds on the [`Scheduler`]).
//!
//! # Lifecycle
//!
//! ```text
//! idle --start--> running --(entry returns)--> completed | failed
//!                    |
//!                    +--stop--> cancelled --start--> running (new run)
//! ```
//!
//! A run that completed or failed on its own is final: further calls to
//! [`start`] are no-ops, just like calls made while the run is outstanding.
//!
//! Cancellation is cooperative: [`stop`] marks the run cancelled right away,
//! and the entry point's future is dropped at its next suspension point. A
//! cancelled run has no result, and that is not an error.
//!
//! # Examples
//!
//! Async callers:
//!
//! ```
//! use std::time::Duration;
//! use async_toolbox::{CoroutineTask, Scheduler};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let task = CoroutineTask::new(Scheduler::current().unwrap(), || async {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     Ok("hello world")
//! });
//!
//! // Await starts the task if needed and yields its result.
//! assert_eq!((&task).await.unwrap(), Some("hello world"));
//!
//! // Stopping before completion leaves no result.
//! let slow = CoroutineTask::new(Scheduler::current().unwrap(), || async {
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     Ok("never")
//! });
//! slow.start().unwrap();
//! assert_eq!(slow.stop().unwrap(), None);
//! assert!(slow.is_cancelled());
//! # });
//! ```
//!
//! Synchronous callers:
//!
//! ```
//! use async_toolbox::{CoroutineTask, Scheduler};
//!
//! let task = CoroutineTask::new(Scheduler::current_thread().unwrap(), || async { Ok(42) });
//! // No runtime on this thread, so start() drives the run to completion.
//! assert_eq!(task.start().unwrap(), Some(42));
//! ```
//!
//! [`start`]: CoroutineTask::start
//! [`stop`]: CoroutineTask::stop

mod entry;
mod scope;
mod status;

use std::fmt;
use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::TaskConfig;
use crate::error::{Result, TaskError};
use crate::scheduler::Scheduler;

pub use entry::{Callback, Coroutine, CoroutineEntry, EntryPoint};
pub use scope::{ScopeExit, TaskScope};
pub use status::TaskStatus;

const DEFAULT_NAME: &str = "coroutine";

/// Lifecycle wrapper around a restartable async entry point.
///
/// See the [module documentation](self) for the lifecycle and examples.
///
/// Dropping a `CoroutineTask` cancels any outstanding run. If the task held
/// the last clone of an owned [`Scheduler`], dropping it also shuts that
/// runtime down; inside an async context this happens in the background
/// instead of blocking.
pub struct CoroutineTask<T> {
    shared: Arc<Shared<T>>,
    entry: Arc<dyn EntryPoint<T>>,
    on_start: Option<Callback>,
    on_end: Option<Callback>,
    scheduler: Scheduler,
    config: TaskConfig,
    name: Arc<str>,
}

impl<T> CoroutineTask<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an idle task that runs `entry` on `scheduler`.
    pub fn new<E>(scheduler: Scheduler, entry: E) -> Self
    where
        E: EntryPoint<T>,
    {
        Self::builder(scheduler, entry).into_task()
    }

    /// Creates an idle task around a [`Coroutine`] implementation.
    pub fn from_coroutine<C>(scheduler: Scheduler, coroutine: Arc<C>) -> Self
    where
        C: Coroutine<Output = T>,
    {
        Self::new(scheduler, CoroutineEntry::new(coroutine))
    }

    /// Starts building a task with callbacks and configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use async_toolbox::{CoroutineTask, Scheduler, TaskConfig};
    ///
    /// let starts = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&starts);
    ///
    /// let task = CoroutineTask::builder(Scheduler::current_thread().unwrap(), || async { Ok(1) })
    ///     .name("counter")
    ///     .on_start(move || {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///     })
    ///     .config(TaskConfig { start_on_create: true, ..TaskConfig::default() })
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(starts.load(Ordering::SeqCst), 1);
    /// assert_eq!(task.result().unwrap(), Some(1));
    /// ```
    pub fn builder<E>(scheduler: Scheduler, entry: E) -> TaskBuilder<T>
    where
        E: EntryPoint<T>,
    {
        TaskBuilder {
            entry: Arc::new(entry),
            scheduler,
            on_start: None,
            on_end: None,
            config: TaskConfig::default(),
            name: None,
        }
    }

    /// Starts a run if the task was never started or its last run was
    /// cancelled.
    ///
    /// Fires the start callback, then submits the entry point to the
    /// scheduler. Calling `start` while a run is outstanding, or after a run
    /// completed or failed on its own, does nothing and returns `Ok(None)`.
    ///
    /// When the caller is not inside any tokio runtime and
    /// [`TaskConfig::block_outside_runtime`] is set, this blocks the calling
    /// thread until the new run finishes and returns its result. Otherwise it
    /// returns `Ok(None)` immediately.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Undrivable`] if it would have to block on a scheduler
    ///   that cannot be driven from this thread (a borrowed current-thread
    ///   runtime). Nothing is started in that case.
    /// - In the blocking case, the entry point's fault.
    pub fn start(&self) -> Result<Option<T>> {
        let blocking = self.blocks_caller()?;
        let Some(generation) = self.launch()? else {
            return Ok(None);
        };

        if blocking {
            tracing::debug!(
                task = %self.name,
                generation,
                "caller is outside a runtime; driving run to completion"
            );
            self.scheduler.block_on(self.shared.settled(generation))?;
            return self.shared.take_result();
        }

        Ok(None)
    }

    /// Cancels the outstanding run, if any, and returns the captured result.
    ///
    /// Cancelling fires the end callback and clears the result. Calling
    /// `stop` with nothing outstanding is a no-op that returns the result of
    /// the last run.
    ///
    /// # Errors
    ///
    /// Returns the last run's fault if it failed and nobody has retrieved the
    /// fault yet. The fault is handed out once.
    pub fn stop(&self) -> Result<Option<T>> {
        if !self.cancel_outstanding() {
            tracing::trace!(task = %self.name, "stop with nothing outstanding");
        }
        self.shared.take_result()
    }

    /// Waits for the current run to finish and returns its result.
    ///
    /// A task that was never started is started first. Awaiting a finished
    /// task returns its result immediately without starting a new run.
    /// `&task` can also be awaited directly.
    ///
    /// # Errors
    ///
    /// Returns the run's fault if it failed (first retriever only).
    pub async fn wait(&self) -> Result<Option<T>> {
        let generation = if self.status() == TaskStatus::Idle {
            match self.launch()? {
                Some(generation) => generation,
                None => self.generation(),
            }
        } else {
            self.generation()
        };

        self.shared.settled(generation).await?;
        self.shared.take_result()
    }

    /// Starts the task and returns a guard that stops it when released.
    ///
    /// Unlike [`start`](Self::start), entering never blocks: scopes are for
    /// async code where something else drives the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] only if the state machine is
    /// violated, which indicates a bug.
    pub fn enter(&self) -> Result<TaskScope<'_, T>> {
        self.launch()?;
        Ok(TaskScope::new(self))
    }

    /// Runs `body` inside a scope: the task is started before the body and
    /// always stopped after it, however the body exits.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use async_toolbox::{CoroutineTask, Scheduler};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let task = CoroutineTask::new(Scheduler::current().unwrap(), || async {
    ///     tokio::time::sleep(Duration::from_secs(60)).await;
    ///     Ok(())
    /// });
    ///
    /// let exit = task.scoped(|t| async move { t.is_running() }).await.unwrap();
    /// assert!(exit.value);
    /// assert!(exit.cancelled);
    /// # });
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`enter`](Self::enter).
    pub async fn scoped<'a, F, Fut, R>(&'a self, body: F) -> Result<ScopeExit<R>>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let scope = self.enter()?;
        let value = body(self).await;
        let cancelled = scope.exit();
        Ok(ScopeExit { value, cancelled })
    }

    /// Returns the captured result without changing the lifecycle.
    ///
    /// Before any run has finished this is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the last run's fault if nobody has retrieved it yet.
    pub fn result(&self) -> Result<Option<T>> {
        self.shared.take_result()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TaskStatus {
        self.shared.state.lock().status
    }

    /// Returns `true` while a run is outstanding.
    pub fn is_running(&self) -> bool {
        self.status().is_outstanding()
    }

    /// Returns `true` if the last run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Number of runs started so far; identifies the current run.
    pub fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scheduler runs are submitted to.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Subscribes to lifecycle changes.
    ///
    /// The receiver starts at the current [`TaskSnapshot`] and observes
    /// every later transition without anything having to drive the
    /// scheduler.
    pub fn watch_status(&self) -> watch::Receiver<TaskSnapshot> {
        self.shared.status_tx.subscribe()
    }

    /// Decides whether `start` has to block the caller, rejecting schedulers
    /// that could never make progress while blocked on.
    fn blocks_caller(&self) -> Result<bool> {
        if !self.config.block_outside_runtime || self.scheduler.caller_in_runtime() {
            return Ok(false);
        }
        if !self.scheduler.can_block_on() {
            tracing::warn!(
                task = %self.name,
                "cannot block on a borrowed current-thread runtime from outside it"
            );
            return Err(TaskError::Undrivable);
        }
        Ok(true)
    }

    /// Creates a new run if the status allows one. Never blocks.
    ///
    /// Returns the new run's generation, or `None` if a run is outstanding
    /// or the last run already finished on its own.
    fn launch(&self) -> Result<Option<u64>> {
        let run = {
            let mut state = self.shared.state.lock();
            if !state.status.can_start() {
                tracing::trace!(
                    task = %self.name,
                    generation = state.generation,
                    status = %state.status,
                    "start ignored"
                );
                return Ok(None);
            }
            state.status.validate_transition(&TaskStatus::Running)?;

            state.generation += 1;
            let run = Arc::new(Run::new(state.generation));
            state.run = Some(Arc::clone(&run));
            state.outcome = Outcome::Empty;
            self.shared.transition(&mut state, TaskStatus::Running);
            run
        };

        if let Some(on_start) = &self.on_start {
            on_start();
        }

        tracing::debug!(task = %self.name, generation = run.generation, "starting run");

        let span = tracing::debug_span!(
            "coroutine_task",
            task = %self.name,
            generation = run.generation
        );
        let generation = run.generation;
        let future = drive(
            Arc::clone(&self.shared),
            run,
            self.entry.call(),
            self.on_end.clone(),
        );
        drop(self.scheduler.spawn(future.instrument(span)));

        Ok(Some(generation))
    }
}

impl<T> CoroutineTask<T> {
    /// Cancels the outstanding run, firing the end callback. Returns `true`
    /// if there was a run to cancel.
    fn cancel_outstanding(&self) -> bool {
        let run = {
            let mut state = self.shared.state.lock();
            if !state.status.is_outstanding() {
                return false;
            }
            state.outcome = Outcome::Empty;
            self.shared.transition(&mut state, TaskStatus::Cancelled);
            state.run.take()
        };

        if let Some(run) = run {
            run.token.cancel();
            if run.claim_end() {
                if let Some(on_end) = &self.on_end {
                    on_end();
                }
            }
            tracing::debug!(task = %self.name, generation = run.generation, "cancelled run");
        }
        true
    }
}

impl<T> Drop for CoroutineTask<T> {
    fn drop(&mut self) {
        if self.cancel_outstanding() {
            tracing::debug!(task = %self.name, "task dropped with a run outstanding");
        }
    }
}

impl<T> fmt::Debug for CoroutineTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CoroutineTask")
            .field("name", &self.name)
            .field("status", &state.status)
            .field("generation", &state.generation)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<'a, T> IntoFuture for &'a CoroutineTask<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<Option<T>>;
    type IntoFuture = BoxFuture<'a, Result<Option<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Builder for [`CoroutineTask`].
pub struct TaskBuilder<T> {
    entry: Arc<dyn EntryPoint<T>>,
    scheduler: Scheduler,
    on_start: Option<Callback>,
    on_end: Option<Callback>,
    config: TaskConfig,
    name: Option<String>,
}

impl<T> TaskBuilder<T>
where
    T: Clone + Send + 'static,
{
    /// Sets the name used in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a callback fired each time a run starts, before the entry point
    /// begins executing.
    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(f));
        self
    }

    /// Sets a callback fired once when a run ends, either by completing or by
    /// being cancelled. It runs before the run's result becomes observable.
    ///
    /// Callbacks must not call back into the same task.
    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(f));
        self
    }

    /// Sets lifecycle configuration.
    pub fn config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the task, starting it if [`TaskConfig::start_on_create`] is set.
    ///
    /// When started from outside a runtime this blocks like
    /// [`CoroutineTask::start`]; the result (or fault) stays captured for
    /// [`CoroutineTask::result`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Undrivable`] when it would have to block on a
    /// borrowed current-thread runtime.
    pub fn build(self) -> Result<CoroutineTask<T>> {
        let start = self.config.start_on_create;
        let task = self.into_task();
        if start {
            let blocking = task.blocks_caller()?;
            if let Some(generation) = task.launch()? {
                if blocking {
                    task.scheduler.block_on(task.shared.settled(generation))?;
                }
            }
        }
        Ok(task)
    }

    fn into_task(self) -> CoroutineTask<T> {
        let (status_tx, _) = watch::channel(TaskSnapshot {
            generation: 0,
            status: TaskStatus::Idle,
        });
        CoroutineTask {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    status: TaskStatus::Idle,
                    generation: 0,
                    outcome: Outcome::Empty,
                    run: None,
                }),
                status_tx,
            }),
            entry: self.entry,
            on_start: self.on_start,
            on_end: self.on_end,
            scheduler: self.scheduler,
            config: self.config,
            name: Arc::from(self.name.as_deref().unwrap_or(DEFAULT_NAME)),
        }
    }
}

// ---- Shared run state ----

/// State shared between the handle and its spawned runs.
struct Shared<T> {
    state: Mutex<State<T>>,
    status_tx: watch::Sender<TaskSnapshot>,
}

struct State<T> {
    status: TaskStatus,
    generation: u64,
    outcome: Outcome<T>,
    run: Option<Arc<Run>>,
}

/// Point-in-time view of a task's lifecycle, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Run the status belongs to; `0` before the first start.
    pub generation: u64,
    /// Lifecycle status.
    pub status: TaskStatus,
}

/// What the last run left behind.
enum Outcome<T> {
    Empty,
    Value(T),
    Fault(TaskError),
}

/// One scheduled execution of the entry point.
struct Run {
    generation: u64,
    token: CancellationToken,
    ended: AtomicBool,
}

impl Run {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
            ended: AtomicBool::new(false),
        }
    }

    /// Claims the right to fire the end callback. Exactly one caller wins.
    fn claim_end(&self) -> bool {
        !self.ended.swap(true, Ordering::AcqRel)
    }
}

impl<T> Shared<T> {
    /// Applies a status change and publishes it. Callers hold the state lock.
    fn transition(&self, state: &mut State<T>, next: TaskStatus) {
        debug_assert!(state.status.can_transition_to(&next));
        state.status = next;
        self.status_tx.send_replace(TaskSnapshot {
            generation: state.generation,
            status: next,
        });
    }

    /// Resolves once run `generation` is no longer outstanding.
    async fn settled(&self, generation: u64) -> Result<()> {
        let mut rx = self.status_tx.subscribe();
        rx.wait_for(|snap| snap.generation != generation || !snap.status.is_outstanding())
            .await
            .map(|_| ())
            .map_err(|_| TaskError::Cancelled)
    }
}

impl<T: Clone> Shared<T> {
    /// Records the outcome of a run that ended on its own.
    fn commit(&self, run: &Run, outcome: Outcome<T>) {
        let mut state = self.state.lock();
        if state.generation != run.generation || !state.status.is_outstanding() {
            tracing::trace!(generation = run.generation, "discarding outcome of superseded run");
            return;
        }

        let next = match &outcome {
            Outcome::Value(_) => TaskStatus::Completed,
            Outcome::Fault(err) => {
                tracing::warn!(generation = run.generation, error = %err, "run failed");
                TaskStatus::Failed
            },
            Outcome::Empty => TaskStatus::Cancelled,
        };
        state.outcome = outcome;
        state.run = None;
        self.transition(&mut state, next);
        tracing::debug!(generation = run.generation, status = %next, "run finished");
    }

    /// Reads the captured result. A fault is moved out to the caller.
    fn take_result(&self) -> Result<Option<T>> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.outcome, Outcome::Empty) {
            Outcome::Empty => Ok(None),
            Outcome::Value(value) => {
                let out = value.clone();
                state.outcome = Outcome::Value(value);
                Ok(Some(out))
            },
            Outcome::Fault(err) => Err(err),
        }
    }
}

/// Body of a spawned run.
async fn drive<T: Clone + Send + 'static>(
    shared: Arc<Shared<T>>,
    run: Arc<Run>,
    future: BoxFuture<'static, anyhow::Result<T>>,
    on_end: Option<Callback>,
) {
    let output = tokio::select! {
        biased;
        () = run.token.cancelled() => {
            tracing::trace!("run observed cancellation");
            return;
        }
        output = AssertUnwindSafe(future).catch_unwind() => output,
    };

    let outcome = match output {
        Ok(Ok(value)) => Outcome::Value(value),
        Ok(Err(err)) => Outcome::Fault(TaskError::Failed(err)),
        Err(panic) => Outcome::Fault(TaskError::from_panic(panic)),
    };

    if !run.claim_end() {
        // stop() won the race and already reported the end.
        return;
    }
    if let Some(on_end) = &on_end {
        on_end();
    }
    shared.commit(&run, outcome);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn counting_task(
        runs: Arc<AtomicUsize>,
        delay: Duration,
    ) -> CoroutineTask<usize> {
        CoroutineTask::new(Scheduler::current().unwrap(), move || {
            let runs = Arc::clone(&runs);
            async move {
                let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(n)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_schedules_one_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = counting_task(Arc::clone(&runs), Duration::from_secs(1));

        assert_eq!(task.start().unwrap(), None);
        assert_eq!(task.start().unwrap(), None);
        assert_eq!(task.generation(), 1);

        assert_eq!(task.wait().await.unwrap(), Some(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_completion_clears_result() {
        let task = counting_task(Arc::new(AtomicUsize::new(0)), Duration::from_secs(1));
        task.start().unwrap();
        tokio::task::yield_now().await;

        assert_eq!(task.stop().unwrap(), None);
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert_eq!(task.result().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_cancel_creates_new_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = counting_task(Arc::clone(&runs), Duration::from_secs(1));

        task.start().unwrap();
        task.stop().unwrap();
        task.start().unwrap();
        assert_eq!(task.generation(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.result().unwrap().is_some());
    }

    #[tokio::test]
    async fn fault_is_handed_out_once() {
        let task: CoroutineTask<()> = CoroutineTask::new(Scheduler::current().unwrap(), || async {
            Err(anyhow::anyhow!("entry exploded"))
        });

        let err = task.wait().await.unwrap_err();
        assert!(matches!(err, TaskError::Failed(_)));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.result().unwrap(), None);
    }

    #[tokio::test]
    async fn panics_become_faults() {
        let task: CoroutineTask<u8> = CoroutineTask::new(Scheduler::current().unwrap(), || async {
            if true {
                panic!("kaboom");
            }
            Ok(0)
        });

        match task.wait().await {
            Err(TaskError::Panicked(msg)) => assert_eq!(msg, "kaboom"),
            other => panic!("expected panic fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_claims_end_once() {
        let run = Run::new(1);
        assert!(run.claim_end());
        assert!(!run.claim_end());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_status_reports_transitions() {
        let task = counting_task(Arc::new(AtomicUsize::new(0)), Duration::from_secs(1));
        let mut rx = task.watch_status();
        assert_eq!(
            *rx.borrow(),
            TaskSnapshot {
                generation: 0,
                status: TaskStatus::Idle,
            }
        );

        task.start().unwrap();
        let snap = *rx
            .wait_for(|s| s.status == TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(snap.generation, 1);
    }

    #[test]
    fn watch_status_needs_no_driver() {
        let task = CoroutineTask::new(Scheduler::current_thread().unwrap(), || async { Ok(1_u8) });
        let mut rx = task.watch_status();
        assert!(!rx.has_changed().unwrap());

        // Blocking start; nothing drives the runtime afterwards.
        assert_eq!(task.start().unwrap(), Some(1));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_completion_is_a_noop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = counting_task(Arc::clone(&runs), Duration::from_millis(1));

        assert_eq!(task.wait().await.unwrap(), Some(1));
        assert_eq!(task.start().unwrap(), None);
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.generation(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(task.result().unwrap(), Some(1));
    }

    #[tokio::test]
    async fn debug_shows_name_and_status() {
        let task = CoroutineTask::builder(Scheduler::current().unwrap(), || async { Ok(0_u8) })
            .name("dbg")
            .build()
            .unwrap();
        let out = format!("{task:?}");
        assert!(out.contains("dbg"));
        assert!(out.contains("Idle"));
    }
}
