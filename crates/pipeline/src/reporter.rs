use crate::run_report::RunReport;
use armada_common::color;
use armada_console::Console;
use armada_task_graph::TaskStatus;
use std::sync::Arc;
use std::time::Duration;

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();

    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Writes the scheduler's own checkpoint and summary lines. These go to
/// the stderr buffer so that collated task output on stdout stays
/// pipeable, and they are short enough to double as the per-task summary
/// in quiet mode.
pub struct Reporter {
    console: Arc<Console>,
}

impl Reporter {
    pub fn new(console: Arc<Console>) -> Reporter {
        Reporter { console }
    }

    pub fn on_pipeline_started(&self, task_count: usize) -> miette::Result<()> {
        self.console.err.write_line(color::muted(format!(
            "Running {task_count} task{}",
            if task_count == 1 { "" } else { "s" }
        )))
    }

    pub fn on_task_finished(
        &self,
        name: &str,
        status: TaskStatus,
        duration: Duration,
    ) -> miette::Result<()> {
        let checkpoint = match status {
            TaskStatus::Success => color::success("✔"),
            TaskStatus::SuccessWithWarning => color::invalid("⚠"),
            TaskStatus::FromCache | TaskStatus::Skipped => color::muted("✔"),
            TaskStatus::Failure | TaskStatus::Blocked => color::failure("✖"),
            TaskStatus::Ready | TaskStatus::Executing => color::muted("▪"),
        };

        let note = match status {
            TaskStatus::FromCache => " (cached)",
            TaskStatus::Skipped => " (skipped)",
            TaskStatus::Blocked => " (blocked)",
            _ => "",
        };

        self.console.err.write_line(format!(
            "{checkpoint} {}{} {}",
            color::id(name),
            color::muted(note),
            color::muted_light(format_duration(duration)),
        ))
    }

    pub fn on_pipeline_finished(&self, report: &RunReport) -> miette::Result<()> {
        let err = &self.console.err;

        for failed in report.failed_reports() {
            err.write_newline()?;
            err.write_line(format!(
                "{} {}",
                color::failure("Task failed:"),
                color::id(&failed.name)
            ))?;

            if let Some(message) = &failed.error {
                err.write_line(color::muted_light(message))?;
            }
        }

        err.write_newline()?;
        err.write_line(format!(
            "{} in {}",
            if report.success {
                color::success("Completed")
            } else {
                color::failure("Failed")
            },
            color::muted_light(format_duration(report.duration)),
        ))?;

        Ok(())
    }
}
