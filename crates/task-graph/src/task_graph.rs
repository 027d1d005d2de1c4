use crate::task::Task;
use crate::task_graph_error::TaskGraphError;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use tracing::{debug, trace};

pub type TaskGraphType = DiGraph<Task, ()>;

/// The executable task set for one build invocation. Tasks are stored in
/// an arena (petgraph node indices) so that the dependency and dependent
/// relations are plain integer edges rather than cyclic pointers. Built
/// once, then frozen before execution.
pub struct TaskGraph {
    graph: TaskGraphType,

    /// Node lookup, mapped by task name.
    indices: FxHashMap<String, NodeIndex>,

    /// Critical-path lengths, computed once during ordering.
    critical_paths: Vec<usize>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGraph {
    pub fn new() -> TaskGraph {
        TaskGraph {
            graph: DiGraph::new(),
            indices: FxHashMap::default(),
            critical_paths: vec![],
        }
    }

    /// Register a new task. Names must be unique within the collection.
    pub fn add_task(&mut self, task: Task) -> miette::Result<NodeIndex> {
        if self.indices.contains_key(&task.name) {
            return Err(TaskGraphError::DuplicateTask {
                id: task.name.clone(),
            }
            .into());
        }

        let name = task.name.clone();
        let index = self.graph.add_node(task);

        trace!(index = index.index(), task = &name, "Registering task");

        self.indices.insert(name, index);

        Ok(index)
    }

    /// Link existing tasks: `name` depends on every task in `dep_names`.
    pub fn add_dependencies(&mut self, name: &str, dep_names: &[&str]) -> miette::Result<()> {
        let index = self.internal_index(name)?;

        for dep_name in dep_names {
            let dep_index = self.internal_index(dep_name)?;

            self.graph.update_edge(index, dep_index, ());
        }

        Ok(())
    }

    pub fn get(&self, index: NodeIndex) -> Option<&Task> {
        self.graph.node_weight(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Task> {
        self.indices.get(name).and_then(|index| self.get(*index))
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    pub fn get_task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of the task at `index`.
    pub fn dependencies_of(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect()
    }

    /// Direct dependents of the task at `index` (the inverse relation).
    pub fn dependents_of(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .collect()
    }

    /// Critical-path length of the task at `index`. Only meaningful once
    /// `ordered_tasks` has run.
    pub fn critical_path(&self, index: NodeIndex) -> usize {
        self.critical_paths.get(index.index()).copied().unwrap_or(0)
    }

    /// Validate acyclicity, then return all task indices sorted by
    /// critical-path length descending, task name ascending. This is the
    /// scheduler's dispatch priority: the longer the chain of dependents
    /// hanging off a task, the sooner it should start.
    pub fn ordered_tasks(&mut self) -> miette::Result<Vec<NodeIndex>> {
        self.check_for_cycles()?;
        self.compute_critical_paths();

        let mut indices = self.graph.node_indices().collect::<Vec<_>>();

        indices.sort_by_key(|index| {
            (
                Reverse(self.critical_paths[index.index()]),
                self.graph[*index].name.clone(),
            )
        });

        debug!(
            order = ?indices
                .iter()
                .map(|index| self.graph[*index].name.as_str())
                .collect::<Vec<_>>(),
            "Ordered tasks by critical path",
        );

        Ok(indices)
    }

    pub fn to_dot(&self) -> String {
        let graph = self.graph.map(|_, task| task.name.clone(), |_, _| ());
        let dot = Dot::with_config(&graph, &[Config::EdgeNoLabel]);

        format!("{dot:?}")
    }

    /// Depth-first traversal over the dependent relation, tracking the
    /// active stack. Revisiting a stack member is a cycle; the error
    /// quotes the full chain, reversed so it reads leaf to root.
    fn check_for_cycles(&self) -> miette::Result<()> {
        let mut visited: FxHashSet<NodeIndex> = FxHashSet::default();
        let mut stack: Vec<NodeIndex> = vec![];

        for start in self.graph.node_indices() {
            if !visited.contains(&start) {
                self.visit_dependents(start, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn visit_dependents(
        &self,
        index: NodeIndex,
        visited: &mut FxHashSet<NodeIndex>,
        stack: &mut Vec<NodeIndex>,
    ) -> miette::Result<()> {
        if let Some(position) = stack.iter().position(|entry| *entry == index) {
            let mut chain = stack[position..]
                .iter()
                .map(|entry| self.graph[*entry].name.clone())
                .collect::<Vec<_>>();

            chain.push(self.graph[index].name.clone());

            return Err(TaskGraphError::CycleDetected {
                chain: chain.join(" → "),
            }
            .into());
        }

        if visited.contains(&index) {
            return Ok(());
        }

        stack.push(index);

        for dependent in self.graph.neighbors_directed(index, Direction::Incoming) {
            self.visit_dependents(dependent, visited, stack)?;
        }

        stack.pop();
        visited.insert(index);

        Ok(())
    }

    /// Critical-path length: 0 for tasks with no dependents, otherwise
    /// 1 + the maximum over all dependents. Memoized per task. Assumes
    /// the graph has already passed the cycle check.
    fn compute_critical_paths(&mut self) {
        let mut memo: Vec<Option<usize>> = vec![None; self.graph.node_count()];

        for index in self.graph.node_indices() {
            self.critical_path_of(index, &mut memo);
        }

        self.critical_paths = memo
            .into_iter()
            .map(|length| length.unwrap_or(0))
            .collect();
    }

    fn critical_path_of(&self, index: NodeIndex, memo: &mut Vec<Option<usize>>) -> usize {
        if let Some(length) = memo[index.index()] {
            return length;
        }

        let length = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect::<Vec<_>>()
            .into_iter()
            .map(|dependent| self.critical_path_of(dependent, memo) + 1)
            .max()
            .unwrap_or(0);

        memo[index.index()] = Some(length);

        length
    }

    fn internal_index(&self, name: &str) -> miette::Result<NodeIndex> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| TaskGraphError::UnknownTask { id: name.to_owned() }.into())
    }
}
