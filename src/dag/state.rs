// src/dag/state.rs

//! Per-run task state bookkeeping.

use std::collections::{HashMap, HashSet};

use crate::task::TaskHandle;

/// Initialization state of a task within one run.
///
/// Transitions only move forward (`NotInitialized` -> `Initializing` ->
/// `Initialized`), except that a failed task drops back from `Initializing`
/// to `NotInitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InitState {
    #[default]
    NotInitialized,
    Initializing,
    Initialized,
}

/// Task state map plus the set of completed tasks.
///
/// Only the scheduler loop writes to this; tasks never touch it directly.
/// Failed tasks go back to `NotInitialized` but are also remembered in
/// `failed`, so the loop never launches them twice in one run.
#[derive(Debug, Default, Clone)]
pub struct StateTracker {
    states: HashMap<TaskHandle, InitState>,
    completed: HashSet<TaskHandle>,
    failed: HashSet<TaskHandle>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything from a previous run.
    pub fn reset(&mut self) {
        self.states.clear();
        self.completed.clear();
        self.failed.clear();
    }

    pub fn set_state(&mut self, task: &TaskHandle, state: InitState) {
        self.states.insert(task.clone(), state);
    }

    /// State of `task`; unknown tasks report `NotInitialized`.
    pub fn get_state(&self, task: &TaskHandle) -> InitState {
        self.states.get(task).copied().unwrap_or_default()
    }

    /// Record a successful initialization.
    pub fn mark_completed(&mut self, task: &TaskHandle) {
        self.states.insert(task.clone(), InitState::Initialized);
        self.completed.insert(task.clone());
    }

    /// Record a failed initialization: the task reverts to `NotInitialized`.
    pub fn mark_failed(&mut self, task: &TaskHandle) {
        self.states.insert(task.clone(), InitState::NotInitialized);
        self.failed.insert(task.clone());
    }

    pub fn has_failed(&self, task: &TaskHandle) -> bool {
        self.failed.contains(task)
    }

    pub fn is_completed(&self, task: &TaskHandle) -> bool {
        self.completed.contains(task)
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }
}
