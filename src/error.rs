//! Error types for task, cache, and configuration operations.
//!
//! [`TaskError`] covers everything that can go wrong while running wrapped
//! async work. Cancellation of a running task is *not* an error
//! for [`CoroutineTask`](crate::task::CoroutineTask): a cancelled run simply
//! has no result. [`TaskError::Cancelled`] is only produced by helpers whose
//! caller expects a value, such as [`to_thread`](crate::blocking::to_thread).

use std::sync::Arc;

use thiserror::Error;

use crate::task::TaskStatus;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

/// Errors that can occur while running or managing async work.
///
/// # Examples
///
/// ```
/// use async_toolbox::{TaskError, TaskStatus};
///
/// let err = TaskError::InvalidTransition {
///     from: TaskStatus::Running,
///     to: TaskStatus::Running,
/// };
/// assert_eq!(err.to_string(), "invalid task transition from running to running");
/// ```
#[derive(Error, Debug)]
pub enum TaskError {
    /// The wrapped entry point returned an error.
    #[error("entry point failed: {0:#}")]
    Failed(anyhow::Error),

    /// A computation shared between several waiters returned an error.
    ///
    /// Each waiter receives a handle to the same underlying error.
    #[error("shared computation failed: {0:#}")]
    Shared(Arc<anyhow::Error>),

    /// The wrapped work panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The work was cancelled before it produced a value.
    #[error("task was cancelled")]
    Cancelled,

    /// A status change was rejected by the task state machine.
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition {
        /// The status the task was in.
        from: TaskStatus,
        /// The status that was rejected.
        to: TaskStatus,
    },

    /// No tokio runtime is available in the calling context.
    #[error("no scheduler is active in the calling context")]
    NoScheduler,

    /// The caller would have to block on a scheduler it cannot drive, such
    /// as a borrowed handle to a current-thread runtime.
    #[error("scheduler cannot be driven from the calling thread")]
    Undrivable,

    /// Building a runtime failed.
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl TaskError {
    /// Returns `true` if this error represents an entry point or computation
    /// fault (as opposed to misuse or an environment problem).
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Shared(_) | Self::Panicked(_))
    }

    /// Builds a [`TaskError::Panicked`] from a panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }

    /// Maps a tokio [`JoinError`](tokio::task::JoinError) into a task error.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            Self::Cancelled
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// The underlying I/O error message.
        error: String,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = TaskError::Failed(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "entry point failed: disk full");

        let err = TaskError::Failed(anyhow::anyhow!("root cause").context("reading index"));
        assert_eq!(
            err.to_string(),
            "entry point failed: reading index: root cause"
        );

        let err = TaskError::Shared(Arc::new(anyhow::anyhow!("upstream 503")));
        assert!(err.to_string().contains("upstream 503"));

        assert_eq!(TaskError::Cancelled.to_string(), "task was cancelled");
        assert_eq!(
            TaskError::NoScheduler.to_string(),
            "no scheduler is active in the calling context"
        );
        assert_eq!(
            TaskError::Undrivable.to_string(),
            "scheduler cannot be driven from the calling thread"
        );
    }

    #[test]
    fn panic_payloads() {
        let err = TaskError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "task panicked: boom");

        let err = TaskError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "task panicked: owned boom");

        let err = TaskError::from_panic(Box::new(42_u32));
        assert_eq!(err.to_string(), "task panicked: unknown panic payload");
    }

    #[test]
    fn fault_classification() {
        assert!(TaskError::Failed(anyhow::anyhow!("x")).is_fault());
        assert!(TaskError::Panicked("x".into()).is_fault());
        assert!(!TaskError::Cancelled.is_fault());
        assert!(!TaskError::NoScheduler.is_fault());
        assert!(!TaskError::Undrivable.is_fault());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Io {
            path: "/nope.toml".to_string(),
            error: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read config file '/nope.toml': not found"
        );
        assert!(ConfigError::Parse("bad".into()).to_string().contains("bad"));
    }
}
