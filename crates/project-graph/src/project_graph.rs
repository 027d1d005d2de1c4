use crate::project::Project;
use crate::project_graph_error::ProjectGraphError;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

pub type ProjectGraphType = DiGraph<Arc<Project>, ()>;

/// Immutable directed graph of all workspace projects, where an edge
/// `A -> B` declares "A depends on B". The graph is not required to be
/// acyclic; cycles are only fatal once tasks are collected and ordered.
pub struct ProjectGraph {
    graph: ProjectGraphType,

    /// Node lookup, mapped by project name.
    indices: FxHashMap<String, NodeIndex>,
}

impl ProjectGraph {
    /// Construct a graph from resolved projects, linking an edge for every
    /// declared local dependency. Fails when a dependency references a
    /// project that does not exist in the provided set.
    pub fn build(projects: Vec<Project>) -> miette::Result<ProjectGraph> {
        debug!(projects = projects.len(), "Creating project graph");

        let mut graph = DiGraph::new();
        let mut indices = FxHashMap::default();

        for project in projects {
            let name = project.name.clone();
            let index = graph.add_node(Arc::new(project));

            indices.insert(name, index);
        }

        for index in graph.node_indices().collect::<Vec<_>>() {
            let project = graph[index].clone();

            for dep_name in &project.dependencies {
                let dep_index = *indices.get(dep_name).ok_or_else(|| {
                    ProjectGraphError::UnknownDependency {
                        id: project.name.clone(),
                        dep_id: dep_name.to_owned(),
                    }
                })?;

                graph.add_edge(index, dep_index, ());
            }
        }

        Ok(ProjectGraph { graph, indices })
    }

    /// Return a project by name.
    pub fn get(&self, name: &str) -> miette::Result<Arc<Project>> {
        let index = self.internal_index(name)?;

        Ok(Arc::clone(&self.graph[index]))
    }

    /// Return all projects, sorted by name.
    pub fn get_all(&self) -> Vec<Arc<Project>> {
        let mut projects = self
            .graph
            .node_weights()
            .map(Arc::clone)
            .collect::<Vec<_>>();

        projects.sort_by(|a, d| a.name.cmp(&d.name));
        projects
    }

    pub fn get_node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct dependencies of the named project.
    pub fn dependencies_of(&self, name: &str) -> miette::Result<Vec<Arc<Project>>> {
        self.internal_neighbors(name, Direction::Outgoing)
    }

    /// Direct dependents of the named project.
    pub fn dependents_of(&self, name: &str) -> miette::Result<Vec<Arc<Project>>> {
        self.internal_neighbors(name, Direction::Incoming)
    }

    /// Select the subset of projects to execute. "to" names select their
    /// transitive upstream closure (the project plus everything it depends
    /// on); "from" names select the transitive downstream closure over the
    /// reversed edge relation. When both lists are empty the whole graph is
    /// selected; when both are non-empty the union of both closures is.
    /// The result is sorted by name for deterministic replay.
    #[instrument(skip(self))]
    pub fn select(&self, to: &[&str], from: &[&str]) -> miette::Result<Vec<Arc<Project>>> {
        if to.is_empty() && from.is_empty() {
            return Ok(self.get_all());
        }

        let mut selected: FxHashSet<NodeIndex> = FxHashSet::default();

        for name in to {
            let start = self.internal_index(name)?;
            let mut bfs = Bfs::new(&self.graph, start);

            while let Some(index) = bfs.next(&self.graph) {
                selected.insert(index);
            }
        }

        for name in from {
            let start = self.internal_index(name)?;
            let reversed = Reversed(&self.graph);
            let mut bfs = Bfs::new(&reversed, start);

            while let Some(index) = bfs.next(&reversed) {
                selected.insert(index);
            }
        }

        let mut projects = selected
            .into_iter()
            .map(|index| Arc::clone(&self.graph[index]))
            .collect::<Vec<_>>();

        projects.sort_by(|a, d| a.name.cmp(&d.name));

        debug!(
            selected = projects.len(),
            total = self.graph.node_count(),
            "Selected projects for execution",
        );

        Ok(projects)
    }

    pub fn to_dot(&self) -> String {
        let graph = self.graph.map(|_, project| project.name.clone(), |_, _| ());
        let dot = Dot::with_config(&graph, &[Config::EdgeNoLabel]);

        format!("{dot:?}")
    }

    fn internal_index(&self, name: &str) -> miette::Result<NodeIndex> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| ProjectGraphError::UnknownProject { id: name.to_owned() }.into())
    }

    fn internal_neighbors(
        &self,
        name: &str,
        direction: Direction,
    ) -> miette::Result<Vec<Arc<Project>>> {
        let index = self.internal_index(name)?;

        let mut projects = self
            .graph
            .neighbors_directed(index, direction)
            .map(|dep_index| Arc::clone(&self.graph[dep_index]))
            .collect::<Vec<_>>();

        projects.sort_by(|a, d| a.name.cmp(&d.name));

        Ok(projects)
    }
}
