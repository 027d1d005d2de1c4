mod project;
mod project_graph;
mod project_graph_error;

pub use project::*;
pub use project_graph::*;
pub use project_graph_error::*;
