// src/handler.rs

//! Host-facing entry point.
//!
//! [`InitializationHandler`] owns an ordered list of [`DependencyEntry`]s, a
//! [`Scheduler`] and the completion callbacks. The host registers tasks,
//! calls [`InitializationHandler::run`] (or [`InitializationHandler::spawn`]
//! to run in the background) and is notified exactly once per run.
//!
//! Tearing the host down is expressed through the handler's lifetime token:
//! [`InitializationHandler::shutdown`] (or cancelling the token returned by
//! [`InitializationHandler::cancel_handle`]) cancels the run in progress and
//! every later one.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dag::{
    DependencyEntry, DependencyGraph, DependencyRef, InitState, RunReport, Scheduler, StatusHandle,
};
use crate::task::{BoxInitFuture, Initializable, TaskRef};

type CompletionCallback = Box<dyn FnMut(&RunReport) + Send + 'static>;

pub struct InitializationHandler {
    entries: Vec<DependencyEntry>,
    scheduler: Scheduler,
    on_complete: Vec<CompletionCallback>,
    lifetime: CancellationToken,
    warn_on_cycles: bool,
}

impl fmt::Debug for InitializationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationHandler")
            .field("entries", &self.entries)
            .field("scheduler", &self.scheduler)
            .field("callbacks", &self.on_complete.len())
            .finish_non_exhaustive()
    }
}

impl Default for InitializationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InitializationHandler {
    pub fn new() -> Self {
        Self::from_entries(Vec::new())
    }

    pub fn from_entries(entries: Vec<DependencyEntry>) -> Self {
        Self {
            entries,
            scheduler: Scheduler::new(),
            on_complete: Vec::new(),
            lifetime: CancellationToken::new(),
            warn_on_cycles: true,
        }
    }

    pub fn entries(&self) -> &[DependencyEntry] {
        &self.entries
    }

    pub fn push_entry(&mut self, entry: DependencyEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Register a task with no dependencies.
    pub fn add_item(&mut self, task: TaskRef) -> &mut Self {
        self.push_entry(DependencyEntry::new(task))
    }

    /// Register several tasks, none of which have dependencies.
    pub fn add_items<I>(&mut self, tasks: I) -> &mut Self
    where
        I: IntoIterator<Item = TaskRef>,
    {
        for task in tasks {
            self.add_item(task);
        }
        self
    }

    /// Register a task that waits for `deps`.
    pub fn add_item_with_dependencies<I, D>(&mut self, task: TaskRef, deps: I) -> &mut Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DependencyRef>,
    {
        self.push_entry(DependencyEntry::with_dependencies(task, deps))
    }

    /// Add a listener that fires once at the end of every run.
    pub fn on_complete<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&RunReport) + Send + 'static,
    {
        self.on_complete.push(Box::new(callback));
        self
    }

    /// Log a warning before a run when the graph contains a cycle.
    pub fn warn_on_cycles(&mut self, enabled: bool) -> &mut Self {
        self.warn_on_cycles = enabled;
        self
    }

    /// Token that cancels the handler's runs when triggered.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Cancel the run in progress (if any) and every later run.
    pub fn shutdown(&self) {
        debug!("initialization handler shutting down");
        self.lifetime.cancel();
    }

    /// State of `task` in the current or most recent run.
    pub fn state_of(&self, task: &TaskRef) -> InitState {
        self.scheduler.state_of(task)
    }

    /// Handle for querying task states while a run is in progress.
    ///
    /// Take it before [`InitializationHandler::run`] or
    /// [`InitializationHandler::spawn`]; it tracks every later run too.
    pub fn status(&self) -> StatusHandle {
        self.scheduler.status()
    }

    /// Graph built from the current entries.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::build(&self.entries)
    }

    /// Run every registered task; cancelled by [`InitializationHandler::shutdown`].
    pub async fn run(&mut self) -> RunReport {
        let cancel = self.lifetime.child_token();
        self.run_with_cancel(cancel).await
    }

    /// Run every registered task under a caller-provided cancellation token.
    pub async fn run_with_cancel(&mut self, cancel: CancellationToken) -> RunReport {
        let graph = self.graph();

        if self.warn_on_cycles {
            if let Some(task) = graph.find_cycle() {
                warn!(task = %task, "dependency cycle detected; the run will deadlock");
            }
        }

        let report = self.scheduler.run(&graph, &cancel).await;

        for callback in self.on_complete.iter_mut() {
            callback(&report);
        }

        report
    }

    /// Run on a background Tokio task, handing the handler back afterwards.
    pub fn spawn(mut self) -> JoinHandle<(Self, RunReport)> {
        tokio::spawn(async move {
            let report = self.run().await;
            (self, report)
        })
    }

    /// Wrap the handler as a task so it can be nested inside another handler.
    ///
    /// The nested task fails unless its own run completes.
    pub fn into_task(self, name: impl Into<String>) -> TaskRef {
        Arc::new(NestedHandler {
            name: name.into(),
            inner: Arc::new(Mutex::new(self)),
        })
    }
}

/// An [`InitializationHandler`] running as a single task of an outer handler.
struct NestedHandler {
    name: String,
    inner: Arc<Mutex<InitializationHandler>>,
}

impl Initializable for NestedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, cancel: CancellationToken) -> BoxInitFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut handler = inner.lock().await;
            let report = handler.run_with_cancel(cancel.child_token()).await;
            if report.is_success() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("nested initialization did not complete: {report}"))
            }
        })
    }
}
