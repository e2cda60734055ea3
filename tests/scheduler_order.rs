// tests/scheduler_order.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use sitepipe::dag::{TaskGraph, TaskOutcome, TaskRegistry, TaskState};
use sitepipe::pipeline::drive_run;
use sitepipe::sched::Scheduler;
use sitepipe_test_utils::builders::SpecBuilder;
use sitepipe_test_utils::fake::FakeExecutor;
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn diamond() -> TaskGraph {
    let mut registry = TaskRegistry::new();
    registry
        .register(SpecBuilder::new("A").build())
        .expect("register A");
    registry
        .register(SpecBuilder::new("B").after("A").build())
        .expect("register B");
    registry
        .register(SpecBuilder::new("C").after("A").build())
        .expect("register C");
    registry
        .register(SpecBuilder::new("D").after("B").after("C").build())
        .expect("register D");
    registry.seal().expect("diamond graph is valid")
}

fn two_roots_one_join() -> TaskGraph {
    let mut registry = TaskRegistry::new();
    registry
        .register(SpecBuilder::new("A").build())
        .expect("register A");
    registry
        .register(SpecBuilder::new("B").build())
        .expect("register B");
    registry
        .register(SpecBuilder::new("C").after("A").after("B").build())
        .expect("register C");
    registry.seal().expect("graph is valid")
}

#[test]
fn a_and_b_settle_before_c_and_c_runs_exactly_once() -> TestResult {
    init_tracing();

    let graph = two_roots_one_join();
    let mut scheduler = Scheduler::new(graph.clone());

    // Requesting only C pulls in A and B via the dependency closure.
    let mut run = scheduler.plan(&["C"])?;
    assert_eq!(run.selection(), &["A", "B", "C"]);

    let ready = run.take_ready(&graph, usize::MAX);
    assert_eq!(ready, vec!["A".to_string(), "B".to_string()]);

    // C must not become ready until *both* roots settled.
    run.record(&graph, "A", TaskOutcome::Succeeded { written: vec![] });
    assert!(run.take_ready(&graph, usize::MAX).is_empty());

    run.record(&graph, "B", TaskOutcome::Succeeded { written: vec![] });
    let ready = run.take_ready(&graph, usize::MAX);
    assert_eq!(ready, vec!["C".to_string()]);

    // Once running, C is never handed out again.
    assert!(run.take_ready(&graph, usize::MAX).is_empty());

    run.record(&graph, "C", TaskOutcome::Succeeded { written: vec![] });
    assert!(run.is_settled());

    let report = run.report();
    assert!(!report.failed);
    for state in report.states.values() {
        assert_eq!(state, &TaskState::Succeeded);
    }

    Ok(())
}

#[test]
fn ready_ties_break_by_registration_order() -> TestResult {
    init_tracing();

    let mut registry = TaskRegistry::new();
    registry.register(SpecBuilder::new("zeta").build())?;
    registry.register(SpecBuilder::new("alpha").build())?;
    let graph = registry.seal()?;

    let mut scheduler = Scheduler::new(graph.clone());
    let mut run = scheduler.plan(&["zeta", "alpha"])?;

    // Both are independent; "zeta" registered first, so it dispatches first.
    let ready = run.take_ready(&graph, usize::MAX);
    assert_eq!(ready, vec!["zeta".to_string(), "alpha".to_string()]);

    Ok(())
}

#[test]
fn parallelism_budget_limits_dispatch() -> TestResult {
    init_tracing();

    let graph = two_roots_one_join();
    let mut scheduler = Scheduler::new(graph.clone());
    let mut run = scheduler.plan(&["C"])?;

    // With a budget of one, only the first ready task is handed out.
    assert_eq!(run.take_ready(&graph, 1), vec!["A".to_string()]);
    assert_eq!(run.take_ready(&graph, 1), vec!["B".to_string()]);
    assert!(run.take_ready(&graph, 1).is_empty());

    Ok(())
}

#[test]
fn planning_unknown_task_fails() {
    init_tracing();

    let graph = two_roots_one_join();
    let mut scheduler = Scheduler::new(graph);

    let err = scheduler.plan(&["nope"]).expect_err("unknown task");
    assert!(matches!(
        err,
        sitepipe::errors::PipelineError::UnknownTask(name) if name == "nope"
    ));
}

#[tokio::test]
async fn driver_settles_diamond_with_each_task_terminal_once() -> TestResult {
    with_timeout(async {
        init_tracing();

        let graph = diamond();
        let mut scheduler = Scheduler::new(graph.clone());
        let run = scheduler.plan(&["D"])?;

        let executed = Arc::new(Mutex::new(Vec::new()));
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor = FakeExecutor::new(settle_tx, Arc::clone(&executed));

        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 0).await?;

        assert!(!report.failed);
        assert_eq!(report.states.len(), 4);
        for state in report.states.values() {
            assert_eq!(state, &TaskState::Succeeded);
        }

        // Every task ran exactly once, A first and D last.
        let executed = executed.lock().expect("executed log");
        assert_eq!(executed.len(), 4);
        assert_eq!(executed[0], "A");
        assert_eq!(executed[3], "D");
        for name in ["A", "B", "C", "D"] {
            assert_eq!(executed.iter().filter(|n| n.as_str() == name).count(), 1);
        }

        Ok(())
    })
    .await
}

#[tokio::test]
async fn driver_respects_parallelism_bound_of_one() -> TestResult {
    with_timeout(async {
        init_tracing();

        let graph = two_roots_one_join();
        let mut scheduler = Scheduler::new(graph.clone());
        let run = scheduler.plan(&["C"])?;

        let executed = Arc::new(Mutex::new(Vec::new()));
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor = FakeExecutor::new(settle_tx, Arc::clone(&executed));

        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 1).await?;

        assert!(!report.failed);
        let executed = executed.lock().expect("executed log");
        assert_eq!(executed.as_slice(), &["A", "B", "C"]);

        Ok(())
    })
    .await
}
