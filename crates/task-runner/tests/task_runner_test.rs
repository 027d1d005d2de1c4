use armada_cache::{
    get_state_path, load_state, save_state, BuildCache, ProjectBuildState, RestoreResult,
    StoreResult,
};
use armada_project_graph::Project;
use armada_task_graph::{Task, TaskStatus};
use armada_task_runner::*;
use armada_vcs::ChangeAnalyzer;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use starbase_sandbox::{create_empty_sandbox, Sandbox};
use std::collections::BTreeMap;
use std::sync::Arc;

struct StaticAnalyzer {
    available: bool,
    files: BTreeMap<String, String>,
}

impl StaticAnalyzer {
    fn new(files: BTreeMap<String, String>) -> Arc<StaticAnalyzer> {
        Arc::new(StaticAnalyzer {
            available: true,
            files,
        })
    }
}

#[async_trait]
impl ChangeAnalyzer for StaticAnalyzer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn get_package_deps(
        &self,
        _project: &Project,
    ) -> miette::Result<BTreeMap<String, String>> {
        Ok(self.files.clone())
    }
}

#[derive(Default)]
struct MemoryCache {
    restore_all: bool,
    store_fails: bool,
    stored: Mutex<FxHashSet<String>>,
    manifests: Mutex<FxHashSet<String>>,
}

#[async_trait]
impl BuildCache for MemoryCache {
    async fn try_restore(
        &self,
        fingerprint: &str,
        _project: &Project,
    ) -> miette::Result<RestoreResult> {
        if self.restore_all || self.stored.lock().contains(fingerprint) {
            Ok(RestoreResult::Restored)
        } else {
            Ok(RestoreResult::Miss)
        }
    }

    async fn try_store(
        &self,
        fingerprint: &str,
        _project: &Project,
    ) -> miette::Result<StoreResult> {
        if self.store_fails {
            return Err(miette::miette!("disk full"));
        }

        self.stored.lock().insert(fingerprint.to_owned());

        Ok(StoreResult::Stored)
    }

    async fn save_manifest(&self, fingerprint: &str, _manifest: &str) -> miette::Result<()> {
        self.manifests.lock().insert(fingerprint.to_owned());

        Ok(())
    }
}

fn sample_files() -> BTreeMap<String, String> {
    BTreeMap::from([("app/main.ts".to_string(), "abc123".to_string())])
}

fn create_task(sandbox: &Sandbox, command: &str) -> Task {
    sandbox.create_file("app/.gitkeep", "");

    let project = Project::new("app", sandbox.path().join("app"), "app");

    Task::new(Arc::new(project), command)
}

fn create_context(sandbox: &Sandbox, options: RunnerOptions) -> RunContext {
    RunContext::new_testing(sandbox.path().to_path_buf(), options)
        .with_analyzer(StaticAnalyzer::new(sample_files()))
}

fn matching_state(command: &str) -> ProjectBuildState {
    ProjectBuildState {
        files: sample_files(),
        arguments: command.into(),
    }
}

mod task_runner {
    use super::*;

    #[tokio::test]
    async fn runs_and_records_state() {
        let sandbox = create_empty_sandbox();
        let task = create_task(&sandbox, "echo hi");
        let context = create_context(&sandbox, RunnerOptions::default());

        let result = TaskRunner::new(&context, &task).run(false).await;

        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.transcript.stdout, "hi\n");

        let state = load_state(&get_state_path(&task.project.root, "build")).unwrap();

        assert_eq!(state.arguments, "echo hi");
        assert_eq!(state.files, sample_files());
    }

    mod incremental {
        use super::*;

        #[tokio::test]
        async fn skips_when_nothing_changed() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default());

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo hi"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Skipped);
            assert_eq!(result.transcript.stdout, "");
        }

        #[tokio::test]
        async fn reruns_when_files_changed() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default());

            let mut state = matching_state("echo hi");
            state
                .files
                .insert("app/main.ts".into(), "different".into());

            save_state(&get_state_path(&task.project.root, "build"), &state).unwrap();

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Success);
        }

        #[tokio::test]
        async fn reruns_when_command_changed() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default());

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo bye"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Success);
        }

        #[tokio::test]
        async fn reruns_when_a_dependency_executed() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default());

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo hi"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(true).await;

            assert_eq!(result.status, TaskStatus::Success);
        }

        #[tokio::test]
        async fn skips_with_changed_projects_only_even_when_a_dependency_executed() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(
                &sandbox,
                RunnerOptions {
                    changed_projects_only: true,
                    ..RunnerOptions::default()
                },
            );

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo hi"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(true).await;

            assert_eq!(result.status, TaskStatus::Skipped);
        }

        #[tokio::test]
        async fn never_skips_when_incremental_is_disabled() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(
                &sandbox,
                RunnerOptions {
                    incremental: false,
                    ..RunnerOptions::default()
                },
            );

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo hi"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Success);
        }

        #[tokio::test]
        async fn always_runs_without_an_analyzer() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context =
                RunContext::new_testing(sandbox.path().to_path_buf(), RunnerOptions::default());

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo hi"),
            )
            .unwrap();

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Success);
            assert_eq!(result.fingerprint, None);

            // Not cacheable, so no fresh state was recorded either
            assert_eq!(load_state(&get_state_path(&task.project.root, "build")), None);
        }
    }

    mod outcomes {
        use super::*;

        #[tokio::test]
        async fn warns_when_stderr_was_written() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo oops 1>&2");
            let context = create_context(&sandbox, RunnerOptions::default());

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::SuccessWithWarning);
            assert_eq!(result.transcript.stderr, "oops\n");
        }

        #[tokio::test]
        async fn fails_on_nonzero_exit() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "exit 3");
            let context = create_context(&sandbox, RunnerOptions::default());

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Failure);
            assert_eq!(result.exit_code, Some(3));
            assert!(result.error.unwrap().contains("exit code 3"));
        }

        #[tokio::test]
        async fn failure_message_is_the_stderr_tail() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo broken 1>&2; exit 1");
            let context = create_context(&sandbox, RunnerOptions::default());

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Failure);
            assert_eq!(result.error.unwrap(), "broken");
        }

        #[tokio::test]
        async fn failed_runs_leave_no_state_behind() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "exit 1");
            let context = create_context(&sandbox, RunnerOptions::default());

            save_state(
                &get_state_path(&task.project.root, "build"),
                &matching_state("echo old"),
            )
            .unwrap();

            TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(load_state(&get_state_path(&task.project.root, "build")), None);
        }

        #[tokio::test]
        async fn empty_command_is_a_no_op() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "");
            let context = create_context(&sandbox, RunnerOptions::default());

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::Success);
            assert_eq!(result.exit_code, None);
            assert_eq!(result.transcript.combined, "");
            assert!(load_state(&get_state_path(&task.project.root, "build")).is_some());
        }
    }

    mod caching {
        use super::*;

        #[tokio::test]
        async fn restores_from_cache_before_running() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default()).with_cache(Arc::new(
                MemoryCache {
                    restore_all: true,
                    ..MemoryCache::default()
                },
            ));

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::FromCache);
            assert!(result.fingerprint.is_some());
            assert_eq!(result.transcript.stdout, "");
            assert!(load_state(&get_state_path(&task.project.root, "build")).is_some());
        }

        #[tokio::test]
        async fn stores_after_a_successful_run() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let cache = Arc::new(MemoryCache::default());
            let context =
                create_context(&sandbox, RunnerOptions::default()).with_cache(cache.clone());

            let result = TaskRunner::new(&context, &task).run(false).await;
            let fingerprint = result.fingerprint.as_deref().unwrap();

            assert_eq!(result.status, TaskStatus::Success);
            assert!(cache.stored.lock().contains(fingerprint));
            assert!(cache.manifests.lock().contains(fingerprint));
        }

        #[tokio::test]
        async fn store_failure_degrades_to_a_warning() {
            let sandbox = create_empty_sandbox();
            let task = create_task(&sandbox, "echo hi");
            let context = create_context(&sandbox, RunnerOptions::default()).with_cache(Arc::new(
                MemoryCache {
                    store_fails: true,
                    ..MemoryCache::default()
                },
            ));

            let result = TaskRunner::new(&context, &task).run(false).await;

            assert_eq!(result.status, TaskStatus::SuccessWithWarning);
        }
    }
}
