//! Scoped acquisition of a running task.

use std::fmt;
use std::ops::Deref;

use super::CoroutineTask;

/// Guard returned by [`CoroutineTask::enter`].
///
/// The task is stopped when the scope is released, either explicitly with
/// [`exit`](Self::exit) or implicitly when the guard is dropped (early
/// return, `?`, panic, or the enclosing future being dropped).
///
/// Releasing a scope never consumes the task's result or fault; read them
/// afterwards with [`CoroutineTask::result`] or [`CoroutineTask::stop`].
pub struct TaskScope<'a, T> {
    task: &'a CoroutineTask<T>,
    released: bool,
}

impl<'a, T> TaskScope<'a, T> {
    pub(super) fn new(task: &'a CoroutineTask<T>) -> Self {
        Self {
            task,
            released: false,
        }
    }

    /// Stops the task and reports whether its run ended cancelled.
    ///
    /// Returns `false` if the run had already finished on its own.
    pub fn exit(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        self.released = true;
        self.task.cancel_outstanding();
        self.task.shared.state.lock().status == super::TaskStatus::Cancelled
    }
}

impl<T> Deref for TaskScope<'_, T> {
    type Target = CoroutineTask<T>;

    fn deref(&self) -> &Self::Target {
        self.task
    }
}

impl<T> Drop for TaskScope<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            let cancelled = self.release();
            tracing::debug!(task = %self.task.name, cancelled, "scope released on drop");
        }
    }
}

impl<T> fmt::Debug for TaskScope<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScope")
            .field("task", &self.task.name)
            .field("released", &self.released)
            .finish()
    }
}

/// Result of [`CoroutineTask::scoped`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeExit<R> {
    /// Whatever the scope body returned.
    pub value: R,
    /// Whether the task's run ended cancelled when the scope was left.
    pub cancelled: bool,
}
