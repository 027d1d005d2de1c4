use armada_common::{Style, Stylize};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ProjectGraphError {
    #[diagnostic(code(project_graph::unknown_dependency))]
    #[error(
        "Project {} declares a dependency on {}, which does not exist in the workspace.",
        .id.style(Style::Id),
        .dep_id.style(Style::Id),
    )]
    UnknownDependency { id: String, dep_id: String },

    #[diagnostic(code(project_graph::unknown_project))]
    #[error("No project has been configured with the name {}.", .id.style(Style::Id))]
    UnknownProject { id: String },
}
