use armada_cache::{BuildCache, RestoreResult, StoreResult};
use armada_pipeline::*;
use armada_project_graph::{Project, ProjectGraph};
use armada_task_graph::TaskStatus;
use armada_vcs::ChangeAnalyzer;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use starbase_sandbox::{create_empty_sandbox, Sandbox};
use std::collections::BTreeMap;
use std::sync::Arc;

struct StaticAnalyzer;

#[async_trait]
impl ChangeAnalyzer for StaticAnalyzer {
    fn is_available(&self) -> bool {
        true
    }

    async fn get_package_deps(
        &self,
        project: &Project,
    ) -> miette::Result<BTreeMap<String, String>> {
        Ok(BTreeMap::from([(
            format!("{}/main.ts", project.source),
            "abc123".to_string(),
        )]))
    }
}

#[derive(Default)]
struct MemoryCache {
    stored: Mutex<FxHashSet<String>>,
}

#[async_trait]
impl BuildCache for MemoryCache {
    async fn try_restore(
        &self,
        fingerprint: &str,
        _project: &Project,
    ) -> miette::Result<RestoreResult> {
        if self.stored.lock().contains(fingerprint) {
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
        self.stored.lock().insert(fingerprint.to_owned());

        Ok(StoreResult::Stored)
    }
}

/// Each project's script appends its name to a shared log, which the
/// assertions below read back as the observed start order.
fn create_project(sandbox: &Sandbox, name: &str, deps: &[&str], script: &str) -> Project {
    sandbox.create_file(format!("{name}/.gitkeep"), "");

    let mut project = Project::new(name, sandbox.path().join(name), name);
    project.dependencies = deps.iter().map(|dep| dep.to_string()).collect();

    if !script.is_empty() {
        project.scripts.insert("build".into(), script.into());
    }

    project
}

fn logging_script(name: &str) -> String {
    format!("echo {name} >> ../order.log")
}

fn read_order(sandbox: &Sandbox) -> Vec<String> {
    std::fs::read_to_string(sandbox.path().join("order.log"))
        .unwrap_or_default()
        .lines()
        .map(|line| line.to_owned())
        .collect()
}

fn position(order: &[String], name: &str) -> usize {
    order
        .iter()
        .position(|entry| entry == name)
        .unwrap_or_else(|| panic!("{name} never ran"))
}

fn create_diamond(sandbox: &Sandbox, b_script: &str) -> ProjectGraph {
    ProjectGraph::build(vec![
        create_project(sandbox, "a", &[], &logging_script("a")),
        create_project(sandbox, "b", &["a"], b_script),
        create_project(sandbox, "c", &["a"], &logging_script("c")),
        create_project(sandbox, "d", &["b", "c"], &logging_script("d")),
    ])
    .unwrap()
}

async fn run_pipeline(
    sandbox: &Sandbox,
    graph: &ProjectGraph,
    options: RunnerOptions,
    configure: impl FnOnce(RunContext) -> RunContext,
) -> miette::Result<RunReport> {
    let context = configure(RunContext::new_testing(
        sandbox.path().to_path_buf(),
        options.clone(),
    ));
    let tasks = TaskSelector::new(graph, &options).select(&[], &[])?;

    Pipeline::new(tasks, context).execute().await
}

fn statuses(report: &RunReport) -> Vec<(String, TaskStatus)> {
    report
        .reports
        .iter()
        .map(|task| (task.name.clone(), task.status))
        .collect()
}

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn linear_chain_executes_in_dependency_order() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "a", &[], &logging_script("a")),
            create_project(&sandbox, "b", &["a"], &logging_script("b")),
            create_project(&sandbox, "c", &["b"], &logging_script("c")),
        ])
        .unwrap();

        let options = RunnerOptions {
            parallelism: Parallelism::Fixed(2),
            ..RunnerOptions::default()
        };

        let report = run_pipeline(&sandbox, &graph, options, |context| context)
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.exit_code(), 0);

        let order = read_order(&sandbox);

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn diamond_completes_with_source_first_and_sink_last() {
        let sandbox = create_empty_sandbox();
        let graph = create_diamond(&sandbox, &logging_script("b"));

        let options = RunnerOptions {
            parallelism: Parallelism::Fixed(3),
            ..RunnerOptions::default()
        };

        let report = run_pipeline(&sandbox, &graph, options, |context| context)
            .await
            .unwrap();

        assert!(report.success);

        for name in ["a", "b", "c", "d"] {
            assert_eq!(report.get(name).unwrap().status, TaskStatus::Success);
        }

        let order = read_order(&sandbox);

        assert_eq!(position(&order, "a"), 0);
        assert_eq!(position(&order, "d"), 3);
    }

    #[tokio::test]
    async fn middle_failure_blocks_downstream_but_not_siblings() {
        let sandbox = create_empty_sandbox();
        let graph = create_diamond(&sandbox, "exit 1");

        let report = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
        })
        .await
        .unwrap();

        assert!(!report.success);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.get("a").unwrap().status, TaskStatus::Success);
        assert_eq!(report.get("b").unwrap().status, TaskStatus::Failure);
        assert_eq!(report.get("c").unwrap().status, TaskStatus::Success);
        assert_eq!(report.get("d").unwrap().status, TaskStatus::Blocked);

        // The sibling ran to completion
        let order = read_order(&sandbox);

        assert!(order.contains(&"c".to_string()));
        assert!(!order.contains(&"d".to_string()));

        // And the failed run converts into the sentinel error
        assert!(report.check().is_err());
    }

    #[tokio::test]
    async fn incremental_second_run_skips_everything() {
        let sandbox = create_empty_sandbox();
        let graph = create_diamond(&sandbox, &logging_script("b"));

        let first = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context.with_analyzer(Arc::new(StaticAnalyzer))
        })
        .await
        .unwrap();

        assert!(first.success);
        assert!(first
            .reports
            .iter()
            .all(|task| task.status == TaskStatus::Success));

        let second = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context.with_analyzer(Arc::new(StaticAnalyzer))
        })
        .await
        .unwrap();

        assert!(second.success);
        assert!(
            second
                .reports
                .iter()
                .all(|task| task.status == TaskStatus::Skipped),
            "expected all skipped, got {:?}",
            statuses(&second),
        );
    }

    #[tokio::test]
    async fn cache_enabled_second_run_restores_everything() {
        let sandbox = create_empty_sandbox();
        let graph = create_diamond(&sandbox, &logging_script("b"));
        let cache = Arc::new(MemoryCache::default());

        let first = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
                .with_analyzer(Arc::new(StaticAnalyzer))
                .with_cache(cache.clone())
        })
        .await
        .unwrap();

        assert!(first.success);

        // A fresh working copy: wipe all build state, keep sources
        for name in ["a", "b", "c", "d"] {
            let state_dir = sandbox.path().join(name).join(".armada");

            if state_dir.exists() {
                std::fs::remove_dir_all(state_dir).unwrap();
            }
        }

        let second = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
                .with_analyzer(Arc::new(StaticAnalyzer))
                .with_cache(cache.clone())
        })
        .await
        .unwrap();

        assert!(second.success);
        assert!(
            second
                .reports
                .iter()
                .all(|task| task.status == TaskStatus::FromCache),
            "expected all from cache, got {:?}",
            statuses(&second),
        );
    }

    #[tokio::test]
    async fn cycle_errors_before_any_execution() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "a", &["b"], &logging_script("a")),
            create_project(&sandbox, "b", &["a"], &logging_script("b")),
        ])
        .unwrap();

        let error = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
        })
        .await
        .err()
        .unwrap();

        assert!(error.to_string().contains("a → b → a"));
        assert!(read_order(&sandbox).is_empty());
    }

    #[tokio::test]
    async fn serial_execution_follows_priority_order() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "z", &[], &logging_script("z")),
            create_project(&sandbox, "m", &[], &logging_script("m")),
            create_project(&sandbox, "a", &[], &logging_script("a")),
        ])
        .unwrap();

        let options = RunnerOptions {
            parallelism: Parallelism::Fixed(1),
            ..RunnerOptions::default()
        };

        let report = run_pipeline(&sandbox, &graph, options, |context| context)
            .await
            .unwrap();

        assert!(report.success);

        // Equal critical paths fall back to name order
        assert_eq!(read_order(&sandbox), vec!["a", "m", "z"]);
    }

    #[tokio::test]
    async fn ignore_dependency_order_runs_despite_upstream_failure() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "a", &[], "exit 1"),
            create_project(&sandbox, "b", &["a"], &logging_script("b")),
        ])
        .unwrap();

        let options = RunnerOptions {
            ignore_dependency_order: true,
            ..RunnerOptions::default()
        };

        let report = run_pipeline(&sandbox, &graph, options, |context| context)
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.get("a").unwrap().status, TaskStatus::Failure);
        assert_eq!(report.get("b").unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn missing_script_is_a_no_op_success() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "a", &[], ""),
            create_project(&sandbox, "b", &["a"], &logging_script("b")),
        ])
        .unwrap();

        let report = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
        })
        .await
        .unwrap();

        assert!(report.success);
        assert_eq!(report.get("a").unwrap().status, TaskStatus::Success);
        assert_eq!(report.get("b").unwrap().status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn warnings_fail_the_run_unless_allowed() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![create_project(
            &sandbox,
            "a",
            &[],
            "echo careful 1>&2",
        )])
        .unwrap();

        let strict = run_pipeline(&sandbox, &graph, RunnerOptions::default(), |context| {
            context
        })
        .await
        .unwrap();

        assert_eq!(
            strict.get("a").unwrap().status,
            TaskStatus::SuccessWithWarning
        );
        assert!(!strict.success);

        let relaxed = run_pipeline(
            &sandbox,
            &graph,
            RunnerOptions {
                allow_warnings: true,
                ..RunnerOptions::default()
            },
            |context| context,
        )
        .await
        .unwrap();

        assert!(relaxed.success);
    }

    #[tokio::test]
    async fn fail_fast_drains_the_frontier() {
        let sandbox = create_empty_sandbox();
        let graph = ProjectGraph::build(vec![
            create_project(&sandbox, "a", &[], "exit 1"),
            create_project(&sandbox, "b", &["a"], &logging_script("b")),
            create_project(&sandbox, "c", &["b"], &logging_script("c")),
        ])
        .unwrap();

        let options = RunnerOptions {
            fail_fast: true,
            parallelism: Parallelism::Fixed(1),
            ..RunnerOptions::default()
        };

        let report = run_pipeline(&sandbox, &graph, options, |context| context)
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.get("a").unwrap().status, TaskStatus::Failure);
        assert!(report.get("b").unwrap().status.is_failure_like());
        assert!(report.get("c").unwrap().status.is_failure_like());
        assert!(read_order(&sandbox).is_empty());
    }
}
