use crate::pipeline_error::PipelineError;
use armada_task_graph::TaskStatus;
use serde::Serialize;
use std::time::Duration;

/// Terminal result of one task within a completed run.
#[derive(Clone, Debug, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub status: TaskStatus,
    pub duration: Duration,
    pub fingerprint: Option<String>,
    pub exit_code: Option<i32>,

    /// Failure message, typically the captured stderr tail.
    pub error: Option<String>,
}

/// Everything `execute()` produced, sorted by task name for
/// deterministic replay.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub reports: Vec<TaskReport>,
    pub duration: Duration,

    /// True iff every task reached a success-like state, with warnings
    /// counting only when the run allows them.
    pub success: bool,
}

impl RunReport {
    pub fn get(&self, name: &str) -> Option<&TaskReport> {
        self.reports.iter().find(|report| report.name == name)
    }

    pub fn failed_reports(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports
            .iter()
            .filter(|report| report.status == TaskStatus::Failure)
    }

    /// Exit code of the whole runner: zero iff overall success.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    /// Convert a failed run into the already-reported sentinel, so
    /// callers branch on error kind instead of re-printing failures.
    pub fn check(self) -> miette::Result<RunReport> {
        if self.success {
            Ok(self)
        } else {
            Err(PipelineError::AlreadyReported.into())
        }
    }
}
