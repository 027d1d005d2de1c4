use armada_project_graph::Project;
use std::sync::Arc;

/// One unit of work: a single project's command for one build invocation.
/// Dependency edges and execution status live outside the task itself,
/// in the collection's graph and the coordinator's state table.
#[derive(Clone, Debug)]
pub struct Task {
    /// Unique task name. Matches the project's package name.
    pub name: String,

    /// The shell command to execute. An empty string marks a no-op task.
    pub command: String,

    pub project: Arc<Project>,
}

impl Task {
    pub fn new(project: Arc<Project>, command: impl AsRef<str>) -> Task {
        Task {
            name: project.name.clone(),
            command: command.as_ref().to_owned(),
            project,
        }
    }

    pub fn is_no_op(&self) -> bool {
        self.command.trim().is_empty()
    }

    pub fn label(&self) -> &str {
        &self.name
    }
}
