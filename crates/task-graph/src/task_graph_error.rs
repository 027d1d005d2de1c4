use armada_common::{Style, Stylize};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum TaskGraphError {
    #[diagnostic(code(task_graph::duplicate_task))]
    #[error("A task named {} has already been registered.", .id.style(Style::Id))]
    DuplicateTask { id: String },

    #[diagnostic(code(task_graph::unknown_task))]
    #[error("No task has been registered with the name {}.", .id.style(Style::Id))]
    UnknownTask { id: String },

    #[diagnostic(
        code(task_graph::cycle_detected),
        help = "A task cannot depend on itself, directly or transitively."
    )]
    #[error("A dependency cycle was detected: {}", .chain.style(Style::Label))]
    CycleDetected { chain: String },
}
