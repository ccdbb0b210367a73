// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::task::{TaskHandle, TaskRef};

/// A reference to something a task should wait for.
///
/// Only [`DependencyRef::Task`] is schedulable. Anything else (for example a
/// name in a plan file that no registered task answers to) is dropped when
/// the graph is built.
#[derive(Clone)]
pub enum DependencyRef {
    Task(TaskRef),
    Unresolved(String),
}

impl DependencyRef {
    fn as_task(&self) -> Option<&TaskRef> {
        match self {
            DependencyRef::Task(task) => Some(task),
            DependencyRef::Unresolved(_) => None,
        }
    }
}

impl From<TaskRef> for DependencyRef {
    fn from(task: TaskRef) -> Self {
        DependencyRef::Task(task)
    }
}

impl From<&TaskRef> for DependencyRef {
    fn from(task: &TaskRef) -> Self {
        DependencyRef::Task(Arc::clone(task))
    }
}

impl std::fmt::Debug for DependencyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyRef::Task(task) => f.debug_tuple("Task").field(&task.name()).finish(),
            DependencyRef::Unresolved(name) => f.debug_tuple("Unresolved").field(name).finish(),
        }
    }
}

/// One declarative line of an initialization plan.
#[derive(Clone)]
pub struct DependencyEntry {
    /// The task to run; `None` entries are skipped.
    pub task: Option<TaskRef>,
    /// Tasks that must be initialized before `task` may start.
    pub dependencies: Vec<DependencyRef>,
    /// Disabled entries are left out of the graph entirely.
    pub enabled: bool,
}

impl DependencyEntry {
    pub fn new(task: TaskRef) -> Self {
        Self {
            task: Some(task),
            dependencies: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_dependencies<I, D>(task: TaskRef, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DependencyRef>,
    {
        Self {
            task: Some(task),
            dependencies: deps.into_iter().map(Into::into).collect(),
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl std::fmt::Debug for DependencyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyEntry")
            .field("task", &self.task.as_ref().map(|t| t.name()))
            .field("dependencies", &self.dependencies)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Immutable dependency graph for a single run.
///
/// Holds the active tasks in declaration order and, for every one of them,
/// the list of tasks it waits for. Built with [`DependencyGraph::build`];
/// cycles are not rejected here, the scheduler reports them as a deadlock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    tasks: Vec<TaskHandle>,
    deps: HashMap<TaskHandle, Vec<TaskHandle>>,
}

impl DependencyGraph {
    /// Build a graph from declarative entries.
    ///
    /// - disabled entries and entries without a task are skipped
    /// - non-task dependency references are dropped
    /// - a task listed in several entries is scheduled once, at the position
    ///   of its first entry, with the dependency list of its last entry
    pub fn build(entries: &[DependencyEntry]) -> Self {
        let mut tasks: Vec<TaskHandle> = Vec::new();
        let mut deps: HashMap<TaskHandle, Vec<TaskHandle>> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if !entry.enabled {
                debug!(entry = idx, "skipping disabled entry");
                continue;
            }
            let Some(task) = entry.task.as_ref() else {
                debug!(entry = idx, "skipping entry without a task");
                continue;
            };

            let handle = TaskHandle::from(task);
            let list = Self::collect_dependencies(&handle, &entry.dependencies);

            if deps.insert(handle.clone(), list).is_some() {
                warn!(
                    task = %handle,
                    entry = idx,
                    "task listed more than once; keeping the later dependency list"
                );
            } else {
                tasks.push(handle);
            }
        }

        Self { tasks, deps }
    }

    fn collect_dependencies(task: &TaskHandle, declared: &[DependencyRef]) -> Vec<TaskHandle> {
        let mut seen = HashSet::new();
        let mut list = Vec::with_capacity(declared.len());

        for dep in declared {
            let Some(dep_task) = dep.as_task() else {
                debug!(task = %task, dependency = ?dep, "dropping non-task dependency");
                continue;
            };
            let dep_handle = TaskHandle::from(dep_task);
            if dep_handle == *task {
                warn!(task = %task, "task depends on itself; it can never become ready");
            }
            if seen.insert(dep_handle.clone()) {
                list.push(dep_handle);
            }
        }

        list
    }

    /// Active tasks in declaration order.
    pub fn active_tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task: &TaskHandle) -> bool {
        self.deps.contains_key(task)
    }

    /// Direct dependencies of `task` (empty for unknown tasks).
    pub fn dependencies_of(&self, task: &TaskHandle) -> &[TaskHandle] {
        self.deps.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Name of some task that sits on a dependency cycle, if any.
    ///
    /// Diagnostics only: the scheduler does not consult this.
    pub fn find_cycle(&self) -> Option<String> {
        let index: HashMap<&TaskHandle, usize> =
            self.tasks.iter().enumerate().map(|(i, t)| (t, i)).collect();

        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..self.tasks.len() {
            graph.add_node(i);
        }
        for (task, deps) in &self.deps {
            let to = index[task];
            for dep in deps {
                if let Some(&from) = index.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => None,
            Err(cycle) => Some(self.tasks[cycle.node_id()].name().to_string()),
        }
    }
}
