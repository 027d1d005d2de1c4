use crate::reporter::Reporter;
use crate::run_report::{RunReport, TaskReport};
use crate::telemetry::TelemetrySink;
use armada_task_graph::{TaskGraph, TaskStatus};
use armada_task_runner::{RunContext, TaskRunResult, TaskRunner};
use petgraph::graph::NodeIndex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

struct WorkerResult {
    index: NodeIndex,
    duration: Duration,
    result: TaskRunResult,
}

/// The parallel scheduler. Owns the frozen task graph and a status table
/// that only this coordinator mutates; workers execute tasks and report
/// transitions back over a channel. At most `parallelism` child
/// processes are ever live at once.
pub struct Pipeline {
    context: RunContext,
    task_graph: TaskGraph,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl Pipeline {
    pub fn new(task_graph: TaskGraph, context: RunContext) -> Pipeline {
        Pipeline {
            context,
            task_graph,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Pipeline {
        self.telemetry = Some(telemetry);
        self
    }

    /// Token for external cancellation: the frontier drains, in-flight
    /// children are signaled, and `execute` returns once workers are
    /// idle.
    pub fn cancel_token(&self) -> CancellationToken {
        self.context.cancel_token.clone()
    }

    /// Drive every task to a terminal state and report the run.
    #[instrument(skip(self))]
    pub async fn execute(mut self) -> miette::Result<RunReport> {
        let run_start = Instant::now();

        // Cycle detection happens here, before anything executes
        let ordered = self.task_graph.ordered_tasks()?;

        let graph = self.task_graph;
        let context = Arc::new(self.context);
        let options = Arc::clone(&context.options);
        let reporter = Reporter::new(Arc::clone(&context.console));
        let telemetry = self.telemetry;

        let total = ordered.len();
        let concurrency = options.parallelism.resolve();

        debug!(total, concurrency, "Starting task pipeline");

        reporter.on_pipeline_started(total)?;

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let (sender, mut receiver) = mpsc::channel::<WorkerResult>(total.max(1));

        // Treat ctrl-c as external cancellation
        let cancel_token = context.cancel_token.clone();
        let signal_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received ctrl-c, cancelling the run");

                cancel_token.cancel();
            }
        });

        let mut statuses = vec![TaskStatus::Ready; graph.get_task_count()];
        let mut reports: Vec<Option<TaskReport>> = (0..graph.get_task_count())
            .map(|_| None)
            .collect();
        let mut in_flight = 0usize;
        let mut halt_new_launches = false;

        loop {
            // Propagate failures: a ready task with a failed or blocked
            // dependency will never run, and neither will its dependents
            for index in propagate_blocked(&graph, &ordered, &mut statuses) {
                let report = terminal_report(&graph, index, TaskStatus::Blocked);

                reporter.on_task_finished(&report.name, report.status, report.duration)?;

                if let Some(telemetry) = &telemetry {
                    telemetry.record_task(&report);
                }

                reports[index.index()] = Some(report);
            }

            // Fill free worker slots from the frontier, highest critical
            // path first
            if !halt_new_launches && !context.cancel_token.is_cancelled() {
                while let Some(next) = find_next_ready(&graph, &ordered, &statuses) {
                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        break;
                    };

                    statuses[next.index()] = TaskStatus::Executing;
                    in_flight += 1;

                    let deps_executed = graph
                        .dependencies_of(next)
                        .into_iter()
                        .any(|dep| statuses[dep.index()].has_executed());

                    let task = graph.get(next).expect("task must exist").clone();
                    let worker_context = Arc::clone(&context);
                    let worker_sender = sender.clone();

                    trace!(
                        task = &task.name,
                        critical_path = graph.critical_path(next),
                        "Dispatching task",
                    );

                    tokio::spawn(async move {
                        let task_start = Instant::now();
                        let result = TaskRunner::new(&worker_context, &task)
                            .run(deps_executed)
                            .await;

                        // Free the slot before reporting, the child has
                        // already exited
                        drop(permit);

                        let _ = worker_sender
                            .send(WorkerResult {
                                index: next,
                                duration: task_start.elapsed(),
                                result,
                            })
                            .await;
                    });
                }
            }

            // Nothing running and nothing dispatchable: the run is done
            // (or drained by cancellation / fail-fast)
            if in_flight == 0 {
                break;
            }

            let Some(done) = receiver.recv().await else {
                break;
            };

            in_flight -= 1;
            let done_index = done.index;
            statuses[done_index.index()] = done.result.status;

            if done.result.status == TaskStatus::Failure && options.fail_fast {
                debug!("A task failed with fail-fast enabled, draining the frontier");

                halt_new_launches = true;
            }

            let report = worker_report(&graph, done);

            reporter.on_task_finished(&report.name, report.status, report.duration)?;

            if let Some(telemetry) = &telemetry {
                telemetry.record_task(&report);
            }

            reports[done_index.index()] = Some(report);
        }

        signal_handle.abort();

        // Tasks stranded by cancellation or fail-fast never ran
        for index in &ordered {
            if !statuses[index.index()].is_terminal() {
                statuses[index.index()] = TaskStatus::Blocked;
                reports[index.index()] = Some(terminal_report(&graph, *index, TaskStatus::Blocked));
            }
        }

        let mut task_reports = reports.into_iter().flatten().collect::<Vec<_>>();
        task_reports.sort_by(|a, d| a.name.cmp(&d.name));

        let success = task_reports.iter().all(|report| match report.status {
            TaskStatus::Success | TaskStatus::Skipped | TaskStatus::FromCache => true,
            TaskStatus::SuccessWithWarning => options.allow_warnings,
            _ => false,
        });

        let report = RunReport {
            reports: task_reports,
            duration: run_start.elapsed(),
            success,
        };

        reporter.on_pipeline_finished(&report)?;

        if let Some(telemetry) = &telemetry {
            telemetry.record_run(&report);
        }

        context.console.out.flush()?;
        context.console.err.flush()?;

        Ok(report)
    }
}

/// First task, in priority order, that is ready with every dependency in
/// a success-like terminal state.
fn find_next_ready(
    graph: &TaskGraph,
    ordered: &[NodeIndex],
    statuses: &[TaskStatus],
) -> Option<NodeIndex> {
    ordered.iter().copied().find(|index| {
        statuses[index.index()] == TaskStatus::Ready
            && graph
                .dependencies_of(*index)
                .into_iter()
                .all(|dep| statuses[dep.index()].is_success_like())
    })
}

/// Mark every ready task with a failed or blocked dependency as blocked,
/// transitively, returning the newly blocked indices.
fn propagate_blocked(
    graph: &TaskGraph,
    ordered: &[NodeIndex],
    statuses: &mut [TaskStatus],
) -> Vec<NodeIndex> {
    let mut newly_blocked = vec![];

    loop {
        let mut changed = false;

        for index in ordered {
            if statuses[index.index()] == TaskStatus::Ready
                && graph
                    .dependencies_of(*index)
                    .into_iter()
                    .any(|dep| statuses[dep.index()].is_failure_like())
            {
                statuses[index.index()] = TaskStatus::Blocked;
                newly_blocked.push(*index);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    newly_blocked
}

fn terminal_report(graph: &TaskGraph, index: NodeIndex, status: TaskStatus) -> TaskReport {
    TaskReport {
        name: graph
            .get(index)
            .map(|task| task.name.clone())
            .unwrap_or_default(),
        status,
        duration: Duration::ZERO,
        fingerprint: None,
        exit_code: None,
        error: None,
    }
}

fn worker_report(graph: &TaskGraph, done: WorkerResult) -> TaskReport {
    TaskReport {
        name: graph
            .get(done.index)
            .map(|task| task.name.clone())
            .unwrap_or_default(),
        status: done.result.status,
        duration: done.duration,
        fingerprint: done.result.fingerprint,
        exit_code: done.result.exit_code,
        error: done.result.error,
    }
}
