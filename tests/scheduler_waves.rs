// tests/scheduler_waves.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use initdag::dag::{DependencyEntry, DependencyGraph, InitState, RunOutcome, Scheduler};
use initdag::task::TaskRef;
use initdag_test_utils::fake_task::{FakeTask, Journal, JournalEvent, task_ref};
use initdag_test_utils::{init_tracing, with_timeout};

fn fake(name: &str, journal: &Journal) -> Arc<FakeTask> {
    FakeTask::new(name, journal).arc()
}

async fn run_entries(scheduler: &mut Scheduler, entries: &[DependencyEntry]) -> initdag::dag::RunReport {
    let graph = DependencyGraph::build(entries);
    with_timeout(scheduler.run(&graph, &CancellationToken::new())).await
}

#[tokio::test]
async fn independent_tasks_share_a_wave_and_dependent_waits_for_both() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).delay_ms(30).arc();
    let b = FakeTask::new("B", &journal).delay_ms(30).arc();
    let c = fake("C", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::new(task_ref(&b)),
        DependencyEntry::with_dependencies(task_ref(&c), [task_ref(&a), task_ref(&b)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.initialized, 3);
    assert_eq!(report.waves, 2);

    let events = journal.events();
    let first_two: Vec<_> = events[..2].to_vec();
    assert!(first_two.contains(&JournalEvent::Started("A".into())));
    assert!(first_two.contains(&JournalEvent::Started("B".into())));
    assert!(journal.finished_before_started("A", "C"));
    assert!(journal.finished_before_started("B", "C"));
    assert_eq!(journal.max_concurrency(), 2);

    for task in [&a, &b, &c] {
        assert_eq!(scheduler.state_of(&task_ref(task)), InitState::Initialized);
        assert_eq!(task.calls(), 1);
    }
}

#[tokio::test]
async fn chain_runs_strictly_in_dependency_order() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).delay_ms(5).arc();
    let b = FakeTask::new("B", &journal).delay_ms(5).arc();
    let c = FakeTask::new("C", &journal).delay_ms(5).arc();
    let d = fake("D", &journal);

    // Declared out of order on purpose.
    let entries = vec![
        DependencyEntry::with_dependencies(task_ref(&d), [task_ref(&c)]),
        DependencyEntry::with_dependencies(task_ref(&c), [task_ref(&b)]),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
        DependencyEntry::new(task_ref(&a)),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert!(report.is_success());
    assert_eq!(report.waves, 4);
    assert_eq!(journal.started(), vec!["A", "B", "C", "D"]);
    assert!(journal.finished_before_started("A", "B"));
    assert!(journal.finished_before_started("B", "C"));
    assert!(journal.finished_before_started("C", "D"));
    assert_eq!(journal.max_concurrency(), 1);
}

#[tokio::test]
async fn diamond_runs_middle_layer_concurrently() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = FakeTask::new("B", &journal).delay_ms(20).arc();
    let c = FakeTask::new("C", &journal).delay_ms(20).arc();
    let d = fake("D", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
        DependencyEntry::with_dependencies(task_ref(&c), [task_ref(&a)]),
        DependencyEntry::with_dependencies(task_ref(&d), [task_ref(&b), task_ref(&c)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert!(report.is_success());
    assert_eq!(report.waves, 3);
    assert_eq!(journal.max_concurrency(), 2);
    assert!(journal.finished_before_started("B", "D"));
    assert!(journal.finished_before_started("C", "D"));
}

#[tokio::test]
async fn dependent_starts_as_soon_as_its_own_dependencies_are_done() {
    init_tracing();

    // A is slow; B is fast and C only needs B, so C must not wait for A.
    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).delay_ms(150).arc();
    let b = fake("B", &journal);
    let c = fake("C", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::new(task_ref(&b)),
        DependencyEntry::with_dependencies(task_ref(&c), [task_ref(&b)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert!(report.is_success());
    assert!(journal.finished_before_started("B", "C"));
    assert!(!journal.finished_before_started("A", "C"));
}

#[tokio::test]
async fn empty_graph_completes_immediately() {
    init_tracing();

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &[]).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.total, 0);
    assert_eq!(report.initialized, 0);
    assert_eq!(report.waves, 0);
    assert!(report.pending().is_empty());
}

#[tokio::test]
async fn two_task_cycle_is_reported_as_deadlock() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = fake("B", &journal);

    let entries = vec![
        DependencyEntry::with_dependencies(task_ref(&a), [task_ref(&b)]),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(
        report.outcome,
        RunOutcome::Deadlocked {
            pending: vec!["A".to_string(), "B".to_string()]
        }
    );
    assert_eq!(scheduler.state_of(&task_ref(&a)), InitState::NotInitialized);
    assert_eq!(scheduler.state_of(&task_ref(&b)), InitState::NotInitialized);
    assert!(journal.events().is_empty());
}

#[tokio::test]
async fn self_dependency_deadlocks_but_independent_work_completes() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = fake("B", &journal);

    let entries = vec![
        DependencyEntry::with_dependencies(task_ref(&a), [task_ref(&a)]),
        DependencyEntry::new(task_ref(&b)),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.pending(), ["A".to_string()]);
    assert!(matches!(report.outcome, RunOutcome::Deadlocked { .. }));
    assert_eq!(scheduler.state_of(&task_ref(&b)), InitState::Initialized);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn failed_task_reverts_and_blocks_its_dependents() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).failing().arc();
    let b = fake("B", &journal);
    let c = FakeTask::new("C", &journal).delay_ms(20).arc();

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
        DependencyEntry::new(task_ref(&c)),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(
        report.outcome,
        RunOutcome::Deadlocked {
            pending: vec!["A".to_string(), "B".to_string()]
        }
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].task, "A");
    assert!(report.failures[0].error.contains("failed on purpose"));

    assert_eq!(scheduler.state_of(&task_ref(&a)), InitState::NotInitialized);
    assert_eq!(scheduler.state_of(&task_ref(&b)), InitState::NotInitialized);
    assert_eq!(scheduler.state_of(&task_ref(&c)), InitState::Initialized);
    assert!(!scheduler.status().is_completed(&task_ref(&a)));

    // Never retried, and its dependent never launched.
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn transitive_dependents_of_a_failure_never_start() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).failing().arc();
    let b = fake("B", &journal);
    let c = fake("C", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
        DependencyEntry::with_dependencies(task_ref(&c), [task_ref(&b)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.pending(), ["A", "B", "C"].map(String::from));
    assert_eq!(journal.started(), vec!["A"]);
}

#[tokio::test]
async fn failure_without_dependents_still_ends_the_run() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).failing().arc();
    let b = fake("B", &journal);

    let entries = vec![DependencyEntry::new(task_ref(&a)), DependencyEntry::new(task_ref(&b))];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.pending(), ["A".to_string()]);
    assert_eq!(report.initialized, 1);
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn panicking_task_counts_as_failure() {
    init_tracing();

    let journal = Journal::new();
    let a = FakeTask::new("A", &journal).panicking().arc();
    let b = fake("B", &journal);

    let entries = vec![DependencyEntry::new(task_ref(&a)), DependencyEntry::new(task_ref(&b))];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("panicked"));
    assert_eq!(scheduler.state_of(&task_ref(&a)), InitState::NotInitialized);
    assert_eq!(scheduler.state_of(&task_ref(&b)), InitState::Initialized);
}

#[tokio::test]
async fn disabled_dependency_is_never_satisfied() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = fake("B", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)).enabled(false),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert_eq!(report.total, 1);
    assert_eq!(report.pending(), ["B".to_string()]);
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn disabled_task_is_not_required_by_anyone_else() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = fake("B", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)).enabled(false),
        DependencyEntry::new(task_ref(&b)),
    ];

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert!(report.is_success());
    assert_eq!(report.total, 1);
    assert_eq!(a.calls(), 0);
    assert_eq!(scheduler.state_of(&task_ref(&a)), InitState::NotInitialized);
}

#[tokio::test]
async fn ready_tasks_launch_in_declaration_order() {
    init_tracing();

    let journal = Journal::new();
    let tasks: Vec<Arc<FakeTask>> = ["first", "second", "third"]
        .iter()
        .map(|n| fake(n, &journal))
        .collect();

    let entries: Vec<DependencyEntry> = tasks.iter().map(|t| DependencyEntry::new(task_ref(t))).collect();

    let mut scheduler = Scheduler::new();
    let report = run_entries(&mut scheduler, &entries).await;

    assert!(report.is_success());
    assert_eq!(report.waves, 1);
    assert_eq!(journal.started(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn each_run_resets_state_and_runs_tasks_again() {
    init_tracing();

    let journal = Journal::new();
    let a = fake("A", &journal);
    let b = fake("B", &journal);

    let entries = vec![
        DependencyEntry::new(task_ref(&a)),
        DependencyEntry::with_dependencies(task_ref(&b), [task_ref(&a)]),
    ];
    let graph = DependencyGraph::build(&entries);
    let mut scheduler = Scheduler::new();

    let first = with_timeout(scheduler.run(&graph, &CancellationToken::new())).await;
    let second = with_timeout(scheduler.run(&graph, &CancellationToken::new())).await;

    assert_eq!(first.run_id, 1);
    assert_eq!(second.run_id, 2);
    assert!(second.is_success());
    assert_eq!(scheduler.runs(), 2);
    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
}

#[test]
fn unknown_task_reports_not_initialized() {
    let journal = Journal::new();
    let stranger: TaskRef = fake("stranger", &journal);
    let scheduler = Scheduler::new();

    assert_eq!(scheduler.state_of(&stranger), InitState::NotInitialized);
}
