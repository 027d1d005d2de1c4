use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-task state machine: `Ready -> Executing -> terminal`. Terminal
/// states are everything except `Ready` and `Executing`. Transitions are
/// applied only by the scheduling coordinator.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Waiting for dependencies and a worker slot.
    #[default]
    Ready,

    /// A worker is driving the task's execution pipeline.
    Executing,

    /// The command exited zero without writing to stderr.
    Success,

    /// The command exited zero but wrote to stderr, or the cache
    /// store failed after a zero exit.
    SuccessWithWarning,

    /// Outputs were restored from the build cache; no command ran.
    FromCache,

    /// Inputs matched the previous successful run; no command ran.
    Skipped,

    /// The command exited non-zero or could not be spawned.
    Failure,

    /// A transitive dependency failed, so the task will never run.
    Blocked,
}

impl TaskStatus {
    /// Success-like states let dependent tasks proceed.
    pub fn is_success_like(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success
                | TaskStatus::SuccessWithWarning
                | TaskStatus::FromCache
                | TaskStatus::Skipped
        )
    }

    /// States in which the project's command actually produced (or
    /// restored) fresh outputs during this run.
    pub fn has_executed(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::SuccessWithWarning | TaskStatus::FromCache
        )
    }

    pub fn is_failure_like(&self) -> bool {
        matches!(self, TaskStatus::Failure | TaskStatus::Blocked)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Ready | TaskStatus::Executing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Ready => "ready",
            TaskStatus::Executing => "executing",
            TaskStatus::Success => "success",
            TaskStatus::SuccessWithWarning => "success with warning",
            TaskStatus::FromCache => "from cache",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failure => "failure",
            TaskStatus::Blocked => "blocked",
        };

        write!(f, "{label}")
    }
}
