use crate::command_builder::build_command;
use crate::command_executor::execute_streamed;
use crate::run_context::RunContext;
use crate::task_fingerprint::TaskFingerprint;
use armada_cache::{
    delete_state, get_state_path, load_state, save_state, ProjectBuildState, RestoreResult,
};
use armada_common::color;
use armada_console::{TaskTranscript, TaskWriter};
use armada_task_graph::{Task, TaskStatus};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Terminal outcome of one task's execution pipeline.
pub struct TaskRunResult {
    pub status: TaskStatus,
    pub fingerprint: Option<String>,
    pub exit_code: Option<i32>,

    /// Failure message: the captured stderr tail, or a synthesized
    /// description when stderr was empty.
    pub error: Option<String>,

    pub transcript: TaskTranscript,
}

/// Executes exactly one task: decides between run, skip, and cache
/// restore, spawns the command when needed, and persists build state on
/// success. Infrastructure errors (spawn failure, broken pipes) become a
/// task `Failure` rather than aborting the run.
pub struct TaskRunner<'task> {
    context: &'task RunContext,
    task: &'task Task,
}

impl<'task> TaskRunner<'task> {
    pub fn new(context: &'task RunContext, task: &'task Task) -> TaskRunner<'task> {
        TaskRunner { context, task }
    }

    /// Drive the task to a terminal state. `deps_executed` reports
    /// whether any dependency produced fresh outputs during this run,
    /// which gates the incremental skip unless `changed_projects_only`
    /// is set.
    #[instrument(name = "run_task", skip_all)]
    pub async fn run(&self, deps_executed: bool) -> TaskRunResult {
        let writer = self.context.collator.writer(&self.task.name);
        let attempt = self.run_internal(&writer, deps_executed).await;

        let transcript = writer.close().unwrap_or_default();

        match attempt {
            Ok((status, fingerprint, exit_code)) => {
                let error = if status == TaskStatus::Failure {
                    Some(failure_message(&transcript, exit_code))
                } else {
                    None
                };

                TaskRunResult {
                    status,
                    fingerprint,
                    exit_code,
                    error,
                    transcript,
                }
            }
            Err(report) => TaskRunResult {
                status: TaskStatus::Failure,
                fingerprint: None,
                exit_code: None,
                error: Some(report.to_string()),
                transcript,
            },
        }
    }

    async fn run_internal(
        &self,
        writer: &TaskWriter,
        deps_executed: bool,
    ) -> miette::Result<(TaskStatus, Option<String>, Option<i32>)> {
        let options = &self.context.options;
        let project = &self.task.project;
        let state_path = get_state_path(&project.root, &options.command);

        // Hash the project's files. When the analyzer is missing or
        // broken the task simply runs fully and is not cacheable.
        let mut cacheable = true;
        let mut files: BTreeMap<String, String> = BTreeMap::new();

        match &self.context.analyzer {
            Some(analyzer) if analyzer.is_available() => {
                match analyzer.get_package_deps(project).await {
                    Ok(map) => {
                        files = map;
                    }
                    Err(error) => {
                        debug!(
                            task = &self.task.name,
                            "Change analysis failed, always rebuilding: {}",
                            color::muted_light(error.to_string()),
                        );

                        cacheable = false;
                    }
                }
            }
            _ => {
                cacheable = false;
            }
        }

        // An empty command is a no-op: record state, succeed, spawn
        // nothing
        if self.task.is_no_op() {
            if cacheable {
                self.write_state(&state_path, &files);
            }

            return Ok((TaskStatus::Success, None, None));
        }

        let fingerprint = if cacheable {
            let (hash, manifest) = TaskFingerprint::new(
                &self.task.command,
                &files,
                options.config_tag.as_deref(),
            )
            .generate()?;

            // Keep the manifest next to the cache entry it explains.
            // Losing it costs diagnostics, not correctness
            if let Some(cache) = &self.context.cache {
                if let Err(error) = cache.save_manifest(&hash, &manifest).await {
                    debug!(
                        task = &self.task.name,
                        "Failed to persist fingerprint manifest: {}",
                        color::muted_light(error.to_string()),
                    );
                }
            }

            Some(hash)
        } else {
            None
        };

        // Cache restore comes before the incremental comparison: a hit
        // materializes outputs even on a fresh working copy
        if let (Some(cache), Some(hash)) = (&self.context.cache, &fingerprint) {
            match cache.try_restore(hash, project).await {
                Ok(RestoreResult::Restored) => {
                    debug!(task = &self.task.name, hash, "Restored outputs from cache");

                    self.write_state(&state_path, &files);

                    return Ok((TaskStatus::FromCache, fingerprint, None));
                }
                Ok(RestoreResult::Miss) => {}
                Err(error) => {
                    warn!(
                        task = &self.task.name,
                        "Cache restore failed, treating as a miss: {}",
                        color::muted_light(error.to_string()),
                    );
                }
            }
        }

        // Incremental skip: inputs and command exactly match the prior
        // successful run, and nothing upstream forces a rebuild
        if cacheable
            && options.incremental
            && (options.changed_projects_only || !deps_executed)
            && load_state(&state_path)
                .is_some_and(|state| state.matches(&files, &self.task.command))
        {
            return Ok((TaskStatus::Skipped, fingerprint, None));
        }

        // Drop stale state first: an interrupted rebuild must not leave
        // a record that claims the old inputs succeeded
        if state_path.exists() {
            let _ = delete_state(&state_path);
        }

        let mut command = build_command(self.task);
        let outcome = execute_streamed(&mut command, writer, &self.context.cancel_token).await?;

        if outcome.cancelled {
            return Ok((TaskStatus::Failure, fingerprint, None));
        }

        if outcome.exit_code != 0 {
            return Ok((
                TaskStatus::Failure,
                fingerprint,
                Some(outcome.exit_code),
            ));
        }

        // Stderr on a zero exit is a warning, regardless of content
        let mut status = if outcome.stderr_bytes > 0 {
            TaskStatus::SuccessWithWarning
        } else {
            TaskStatus::Success
        };

        // State write and cache store proceed in parallel; both are
        // best-effort, but a failed archive degrades the outcome
        if let (Some(cache), Some(hash)) = (&self.context.cache, &fingerprint) {
            let (store_result, _) = tokio::join!(cache.try_store(hash, project), async {
                self.write_state(&state_path, &files);
            });

            if let Err(error) = store_result {
                warn!(
                    task = &self.task.name,
                    "Failed to store outputs in cache: {}",
                    color::muted_light(error.to_string()),
                );

                status = TaskStatus::SuccessWithWarning;
            }
        } else if cacheable {
            self.write_state(&state_path, &files);
        }

        Ok((status, fingerprint, Some(outcome.exit_code)))
    }

    /// State-file write failures cost the next run a skip, nothing more.
    fn write_state(&self, state_path: &std::path::Path, files: &BTreeMap<String, String>) {
        let state = ProjectBuildState {
            files: files.clone(),
            arguments: self.task.command.clone(),
        };

        if let Err(error) = save_state(state_path, &state) {
            warn!(
                task = &self.task.name,
                "Failed to write build state: {}",
                color::muted_light(error.to_string()),
            );
        }
    }
}

/// The last lines of captured stderr, used as the failure message.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines = stderr.trim_end().lines().collect::<Vec<_>>();
    let start = lines.len().saturating_sub(max_lines);

    lines[start..].join("\n")
}

fn failure_message(transcript: &TaskTranscript, exit_code: Option<i32>) -> String {
    let tail = stderr_tail(&transcript.stderr, 10);

    if tail.is_empty() {
        match exit_code {
            Some(code) => format!("Task failed with exit code {code}."),
            None => "Task was cancelled before completing.".into(),
        }
    } else {
        tail
    }
}
