//! Task lifecycle status and its state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Lifecycle status of a [`CoroutineTask`](super::CoroutineTask).
///
/// # State Machine
///
/// ```text
/// Idle -> Running
/// Running -> Completed, Failed, Cancelled
/// Cancelled -> Running (restart)
/// ```
///
/// `Running` is the only *outstanding* status. Only a never-started or a
/// cancelled task can start a new run; `Completed` and `Failed` are final.
/// Self-transitions are rejected, and nothing ever transitions back to
/// `Idle`.
///
/// # Examples
///
/// ```
/// use async_toolbox::TaskStatus;
///
/// let status = TaskStatus::Idle;
/// assert!(!status.is_outstanding());
/// assert!(status.can_transition_to(&TaskStatus::Running));
/// assert!(!status.can_transition_to(&TaskStatus::Completed));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Never started.
    #[default]
    Idle,
    /// A run is scheduled and has not reached a terminal status.
    Running,
    /// The last run returned a value.
    Completed,
    /// The last run returned an error or panicked.
    Failed,
    /// The last run was cancelled before it finished.
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl TaskStatus {
    /// Returns `true` if a run is outstanding.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the last run has ended.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_toolbox::TaskStatus;
    ///
    /// assert!(!TaskStatus::Idle.is_terminal());
    /// assert!(!TaskStatus::Running.is_terminal());
    /// assert!(TaskStatus::Completed.is_terminal());
    /// assert!(TaskStatus::Failed.is_terminal());
    /// assert!(TaskStatus::Cancelled.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if a new run may start from this status.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Cancelled)
    }

    /// Returns `true` if transitioning from this status to `next` is valid.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }

        match self {
            Self::Idle | Self::Cancelled => matches!(next, Self::Running),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Validates a transition from this status to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] if the state machine does not
    /// allow it.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_toolbox::TaskStatus;
    ///
    /// assert!(TaskStatus::Running.validate_transition(&TaskStatus::Cancelled).is_ok());
    /// assert!(TaskStatus::Cancelled.validate_transition(&TaskStatus::Completed).is_err());
    /// assert!(TaskStatus::Completed.validate_transition(&TaskStatus::Running).is_err());
    /// ```
    pub fn validate_transition(&self, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                from: *self,
                to: *next,
            })
        }
    }
}
