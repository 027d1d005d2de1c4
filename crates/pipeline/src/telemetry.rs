use crate::run_report::{RunReport, TaskReport};

/// Receives per-task results and the final run summary. Configured at
/// pipeline construction; when absent, nothing is recorded.
pub trait TelemetrySink: Send + Sync {
    fn record_task(&self, report: &TaskReport);

    fn record_run(&self, report: &RunReport);
}
