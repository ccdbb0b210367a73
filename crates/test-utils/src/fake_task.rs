use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use initdag::task::{BoxInitFuture, Initializable, TaskRef};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Something a fake task did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    Started(String),
    Finished(String),
}

/// Shared, ordered log of task starts and finishes.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<JournalEvent>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: JournalEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<JournalEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Task names in the order they started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                JournalEvent::Started(name) => Some(name),
                JournalEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn has_started(&self, task: &str) -> bool {
        self.started().iter().any(|t| t == task)
    }

    fn position(&self, event: &JournalEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Whether `dep` finished before `task` started.
    pub fn finished_before_started(&self, dep: &str, task: &str) -> bool {
        match (
            self.position(&JournalEvent::Finished(dep.to_string())),
            self.position(&JournalEvent::Started(task.to_string())),
        ) {
            (Some(f), Some(s)) => f < s,
            _ => false,
        }
    }

    /// Highest number of tasks that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        let mut running = 0usize;
        let mut max = 0usize;
        for event in self.events() {
            match event {
                JournalEvent::Started(_) => {
                    running += 1;
                    max = max.max(running);
                }
                JournalEvent::Finished(_) => running = running.saturating_sub(1),
            }
        }
        max
    }
}

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
    UntilCancelled,
    Gate(Arc<Notify>),
}

/// A controllable task for scheduler tests.
///
/// Records every start/finish in a [`Journal`] and counts how many times
/// `init` was called.
#[derive(Debug)]
pub struct FakeTask {
    name: String,
    delay: Duration,
    behaviour: Behaviour,
    journal: Journal,
    calls: AtomicUsize,
}

impl FakeTask {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            behaviour: Behaviour::Succeed,
            journal: journal.clone(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before settling.
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Return an error instead of succeeding.
    pub fn failing(mut self) -> Self {
        self.behaviour = Behaviour::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behaviour = Behaviour::Panic;
        self
    }

    /// Block until the run's token fires, then fail.
    pub fn until_cancelled(mut self) -> Self {
        self.behaviour = Behaviour::UntilCancelled;
        self
    }

    /// Block until `gate` is notified, then succeed.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.behaviour = Behaviour::Gate(gate);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Upcast a fake task to a [`TaskRef`] without losing its identity.
pub fn task_ref(task: &Arc<FakeTask>) -> TaskRef {
    task.clone()
}

impl Initializable for FakeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, cancel: CancellationToken) -> BoxInitFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let name = self.name.clone();
        let delay = self.delay;
        let behaviour = self.behaviour.clone();
        let journal = self.journal.clone();

        Box::pin(async move {
            journal.push(JournalEvent::Started(name.clone()));

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = match behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(anyhow::anyhow!("{name} failed on purpose")),
                Behaviour::Panic => panic!("{name} panicked on purpose"),
                Behaviour::UntilCancelled => {
                    cancel.cancelled().await;
                    Err(anyhow::anyhow!("{name} cancelled"))
                }
                Behaviour::Gate(gate) => {
                    gate.notified().await;
                    Ok(())
                }
            };

            journal.push(JournalEvent::Finished(name));
            result
        })
    }
}
