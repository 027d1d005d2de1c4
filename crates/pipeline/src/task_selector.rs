use armada_project_graph::ProjectGraph;
use armada_task_graph::{Task, TaskGraph};
use armada_task_runner::RunnerOptions;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds the executable task set from a project-graph selection: one
/// task per selected project running the configured script, linked by
/// the dependency edges that survive within the selection.
pub struct TaskSelector<'graph> {
    project_graph: &'graph ProjectGraph,
    options: &'graph RunnerOptions,
}

impl<'graph> TaskSelector<'graph> {
    pub fn new(project_graph: &'graph ProjectGraph, options: &'graph RunnerOptions) -> Self {
        TaskSelector {
            project_graph,
            options,
        }
    }

    #[instrument(skip(self))]
    pub fn select(&self, to: &[&str], from: &[&str]) -> miette::Result<TaskGraph> {
        let projects = self.project_graph.select(to, from)?;
        let selected = projects
            .iter()
            .map(|project| project.name.as_str())
            .collect::<FxHashSet<_>>();

        let mut graph = TaskGraph::new();

        for project in &projects {
            // A project without the requested script is a no-op task, so
            // it still anchors ordering between its neighbors
            let command = project
                .get_script(&self.options.command)
                .unwrap_or_default()
                .to_owned();

            graph.add_task(Task::new(Arc::clone(project), command))?;
        }

        if !self.options.ignore_dependency_order {
            for project in &projects {
                let dep_names = project
                    .dependencies
                    .iter()
                    .filter(|dep| {
                        // Edges only within the selection; declared-cycle
                        // exceptions never become task edges
                        selected.contains(dep.as_str())
                            && !project.is_dependency_decoupled(dep)
                    })
                    .map(String::as_str)
                    .collect::<Vec<_>>();

                if !dep_names.is_empty() {
                    graph.add_dependencies(&project.name, &dep_names)?;
                }
            }
        }

        debug!(
            tasks = graph.get_task_count(),
            command = &self.options.command,
            "Built task graph from selection",
        );

        Ok(graph)
    }
}
