// src/dag/scheduler.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::state::{InitState, StateTracker};
use crate::task::{TaskHandle, TaskRef};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every active task reached `Initialized`.
    Completed,
    /// Nothing was ready and nothing was in flight while tasks were still
    /// outstanding: a cycle, a failed dependency, or a dependency that is not
    /// part of the graph.
    Deadlocked { pending: Vec<String> },
    /// The run's cancellation token fired before every task completed.
    Cancelled { pending: Vec<String> },
}

/// A task whose `init` returned an error (or panicked) during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub error: String,
}

/// Summary handed back to the host once a run has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub outcome: RunOutcome,
    /// Number of active tasks in the graph.
    pub total: usize,
    /// Number of tasks that reached `Initialized`.
    pub initialized: usize,
    /// Number of waves launched.
    pub waves: usize,
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Names of the tasks that never completed (empty on success).
    pub fn pending(&self) -> &[String] {
        match &self.outcome {
            RunOutcome::Completed => &[],
            RunOutcome::Deadlocked { pending } | RunOutcome::Cancelled { pending } => pending,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, pending) = match &self.outcome {
            RunOutcome::Completed => {
                return write!(
                    f,
                    "run {}: initialized {}/{} tasks in {} waves",
                    self.run_id, self.initialized, self.total, self.waves
                );
            }
            RunOutcome::Deadlocked { pending } => ("deadlocked", pending),
            RunOutcome::Cancelled { pending } => ("cancelled", pending),
        };

        write!(
            f,
            "run {}: {verb} with {}/{} tasks initialized",
            self.run_id, self.initialized, self.total
        )?;
        if !pending.is_empty() {
            write!(f, "; never completed: {}", pending.join(", "))?;
        }
        Ok(())
    }
}

/// Why the wavefront loop stopped.
enum Exit {
    Completed,
    Deadlocked,
    Cancelled,
}

/// Operations launched but not yet settled, keyed back to their task.
struct InFlight {
    set: JoinSet<anyhow::Result<()>>,
    tasks: HashMap<Id, TaskHandle>,
}

type Settled = (TaskHandle, anyhow::Result<()>);

impl InFlight {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            tasks: HashMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    fn len(&self) -> usize {
        self.set.len()
    }

    fn launch(&mut self, task: TaskHandle, cancel: CancellationToken) {
        let fut = task.task().init(cancel);
        let abort = self.set.spawn(fut);
        self.tasks.insert(abort.id(), task);
    }

    /// Wait for the next operation to settle. `None` once nothing is in flight.
    async fn next(&mut self) -> Option<Settled> {
        let joined = self.set.join_next_with_id().await?;
        self.settled(joined)
    }

    /// An operation that has already settled, without waiting.
    fn try_next(&mut self) -> Option<Settled> {
        let joined = self.set.try_join_next_with_id()?;
        self.settled(joined)
    }

    fn settled(
        &mut self,
        joined: Result<(Id, anyhow::Result<()>), JoinError>,
    ) -> Option<Settled> {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(err) => {
                let id = err.id();
                let result = if err.is_panic() {
                    Err(anyhow::anyhow!("init panicked"))
                } else {
                    Err(anyhow::anyhow!("init was aborted"))
                };
                (id, result)
            }
        };

        match self.tasks.remove(&id) {
            Some(task) => Some((task, result)),
            None => {
                warn!(?id, "settled operation with no matching task; ignoring");
                None
            }
        }
    }
}

/// Cloneable, read-only view of a [`Scheduler`]'s task states.
///
/// Stays valid while the scheduler is running (or has been moved into a
/// background task), so hosts can poll progress mid-run.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    tracker: Arc<RwLock<StateTracker>>,
}

impl StatusHandle {
    /// Current state of `task`; tasks outside the graph report `NotInitialized`.
    pub fn state_of(&self, task: &TaskRef) -> InitState {
        self.tracker.read().get_state(&TaskHandle::from(task))
    }

    pub fn is_completed(&self, task: &TaskRef) -> bool {
        self.tracker.read().is_completed(&TaskHandle::from(task))
    }

    pub fn completed_len(&self) -> usize {
        self.tracker.read().completed_len()
    }
}

/// Runs a [`DependencyGraph`] to completion, wave by wave.
///
/// Each iteration launches every task that is `NotInitialized` and whose
/// dependencies have all completed, then waits until at least one in-flight
/// operation settles. The loop ends when every task is initialized, when
/// nothing can make progress any more (deadlock) or when the run's
/// cancellation token fires. Remaining in-flight operations are always
/// awaited before `run` returns.
///
/// The scheduler owns the per-run [`StateTracker`] and is its only writer.
/// The tracker is reset at the start of each run; it can be read during and
/// after a run through [`Scheduler::state_of`] or a [`StatusHandle`].
#[derive(Debug, Default)]
pub struct Scheduler {
    status: StatusHandle,
    run_counter: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `task` in the current or most recent run.
    pub fn state_of(&self, task: &TaskRef) -> InitState {
        self.status.state_of(task)
    }

    /// Handle for reading task states while a run is in progress.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Number of runs started so far.
    pub fn runs(&self) -> u64 {
        self.run_counter
    }

    /// Drive every task of `graph` to completion.
    pub async fn run(&mut self, graph: &DependencyGraph, cancel: &CancellationToken) -> RunReport {
        self.run_counter += 1;
        let run_id = self.run_counter;

        {
            let mut tracker = self.status.tracker.write();
            tracker.reset();
            for task in graph.active_tasks() {
                tracker.set_state(task, InitState::NotInitialized);
            }
        }

        let total = graph.len();
        info!(run_id, tasks = total, "starting initialization run");

        let mut in_flight = InFlight::new();
        let mut failures = Vec::new();
        let mut waves = 0usize;

        let exit = loop {
            if self.status.completed_len() >= total {
                break Exit::Completed;
            }
            if cancel.is_cancelled() {
                info!(run_id, in_flight = in_flight.len(), "run cancelled; no further waves");
                break Exit::Cancelled;
            }

            let ready = self.ready_tasks(graph);

            if ready.is_empty() {
                if in_flight.is_empty() {
                    error!(
                        run_id,
                        completed = self.status.completed_len(),
                        total,
                        "no task can be initialized: circular or unsatisfiable dependencies"
                    );
                    break Exit::Deadlocked;
                }
            } else {
                waves += 1;
                debug!(
                    run_id,
                    wave = waves,
                    tasks = ?ready.iter().map(TaskHandle::name).collect::<Vec<_>>(),
                    "launching wave"
                );
                for task in ready {
                    self.set_state(&task, InitState::Initializing);
                    in_flight.launch(task, cancel.clone());
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                settled = in_flight.next() => {
                    if let Some((task, result)) = settled {
                        self.apply(task, result, &mut failures);
                    }
                }
            }
            while let Some((task, result)) = in_flight.try_next() {
                self.apply(task, result, &mut failures);
            }
        };

        if !in_flight.is_empty() {
            debug!(run_id, in_flight = in_flight.len(), "waiting for in-flight tasks to settle");
        }
        while !in_flight.is_empty() {
            if let Some((task, result)) = in_flight.next().await {
                self.apply(task, result, &mut failures);
            }
        }

        let (pending, initialized) = {
            let tracker = self.status.tracker.read();
            let pending: Vec<String> = graph
                .active_tasks()
                .iter()
                .filter(|t| !tracker.is_completed(t))
                .map(|t| t.name().to_string())
                .collect();
            (pending, tracker.completed_len())
        };

        let outcome = match exit {
            Exit::Completed => RunOutcome::Completed,
            Exit::Deadlocked => RunOutcome::Deadlocked { pending },
            Exit::Cancelled => RunOutcome::Cancelled { pending },
        };

        let report = RunReport {
            run_id,
            outcome,
            total,
            initialized,
            waves,
            failures,
        };

        if report.is_success() {
            info!(run_id, initialized = report.initialized, waves, "initialization run complete");
        } else {
            warn!(run_id, %report, "initialization run ended early");
        }

        report
    }

    /// Tasks that may start now, in declaration order.
    fn ready_tasks(&self, graph: &DependencyGraph) -> Vec<TaskHandle> {
        let tracker = self.status.tracker.read();
        graph
            .active_tasks()
            .iter()
            .filter(|task| {
                tracker.get_state(task) == InitState::NotInitialized
                    && !tracker.has_failed(task)
                    && graph
                        .dependencies_of(task)
                        .iter()
                        .all(|dep| tracker.is_completed(dep))
            })
            .cloned()
            .collect()
    }

    fn set_state(&self, task: &TaskHandle, state: InitState) {
        self.status.tracker.write().set_state(task, state);
    }

    fn apply(&mut self, task: TaskHandle, result: anyhow::Result<()>, failures: &mut Vec<TaskFailure>) {
        match result {
            Ok(()) => {
                self.status.tracker.write().mark_completed(&task);
                info!(task = %task, "initialized");
            }
            Err(err) => {
                error!(task = %task, error = %err, "failed to initialize");
                self.status.tracker.write().mark_failed(&task);
                failures.push(TaskFailure {
                    task: task.name().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
}
