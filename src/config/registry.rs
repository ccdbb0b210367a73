// src/config/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::PlanFile;
use crate::dag::{DependencyEntry, DependencyRef};
use crate::exec::CommandTask;
use crate::task::TaskRef;

/// Name -> task bindings used to resolve a [`PlanFile`].
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskRef>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("TaskRegistry").field("tasks", &names).finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a [`CommandTask`] for every plan item that has a `cmd`.
    pub fn from_commands(plan: &PlanFile) -> Self {
        let mut registry = Self::new();
        for item in plan.items() {
            if let Some(cmd) = &item.cmd {
                registry.register(Arc::new(CommandTask::new(item.name.clone(), cmd.clone())));
            }
        }
        registry
    }

    /// Register `task` under its own name, replacing any earlier binding.
    pub fn register(&mut self, task: TaskRef) -> &mut Self {
        let name = task.name().to_string();
        self.register_as(name, task)
    }

    pub fn register_as(&mut self, name: impl Into<String>, task: TaskRef) -> &mut Self {
        self.tasks.insert(name.into(), task);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TaskRef> {
        self.tasks.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl PlanFile {
    /// Bind every item to a registered task.
    ///
    /// Items whose name has no registered task get no task (and are skipped
    /// by the graph builder); `after` names with no registered task become
    /// [`DependencyRef::Unresolved`].
    pub fn resolve(&self, registry: &TaskRegistry) -> Vec<DependencyEntry> {
        self.items()
            .iter()
            .map(|item| {
                let task = registry.get(&item.name).cloned();
                if task.is_none() {
                    debug!(item = %item.name, "no task registered for plan item");
                }

                let dependencies = item
                    .after
                    .iter()
                    .map(|dep| match registry.get(dep) {
                        Some(task) => DependencyRef::Task(Arc::clone(task)),
                        None => DependencyRef::Unresolved(dep.clone()),
                    })
                    .collect();

                DependencyEntry {
                    task,
                    dependencies,
                    enabled: item.enabled,
                }
            })
            .collect()
    }
}
