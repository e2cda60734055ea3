// tests/failure_cascade.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use sitepipe::dag::{SkipReason, TaskGraph, TaskRegistry, TaskState};
use sitepipe::pipeline::drive_run;
use sitepipe::sched::Scheduler;
use sitepipe_test_utils::builders::SpecBuilder;
use sitepipe_test_utils::fake::FakeExecutor;
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// generate -> minify -> publish, plus an unrelated fonts task.
fn chain_with_bystander() -> TaskGraph {
    let mut registry = TaskRegistry::new();
    registry
        .register(SpecBuilder::new("generate").build())
        .expect("register generate");
    registry
        .register(SpecBuilder::new("minify").after("generate").build())
        .expect("register minify");
    registry
        .register(SpecBuilder::new("publish").after("minify").build())
        .expect("register publish");
    registry
        .register(SpecBuilder::new("fonts").build())
        .expect("register fonts");
    registry.seal().expect("graph is valid")
}

#[tokio::test]
async fn failed_dependency_skips_dependents_with_recorded_cause() -> TestResult {
    with_timeout(async {
        init_tracing();

        let graph = chain_with_bystander();
        let mut scheduler = Scheduler::new(graph.clone());
        let run = scheduler.plan(&["publish", "fonts"])?;

        let executed = Arc::new(Mutex::new(Vec::new()));
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor =
            FakeExecutor::new(settle_tx, Arc::clone(&executed)).fail_task("generate", "boom");

        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 0).await?;

        // The whole run fails: the requested "publish" was skipped because
        // something upstream of it failed.
        assert!(report.failed);
        assert_eq!(report.states["generate"], TaskState::Failed);
        assert_eq!(report.failures["generate"], "boom");

        // Both transitive dependents are skipped, and the recorded cause is
        // the task that actually failed, not the intermediate.
        let upstream = SkipReason::UpstreamFailed("generate".to_string());
        assert_eq!(report.states["minify"], TaskState::Skipped(upstream.clone()));
        assert_eq!(report.states["publish"], TaskState::Skipped(upstream));

        // The unrelated task is unaffected.
        assert_eq!(report.states["fonts"], TaskState::Succeeded);

        // Skipped tasks were never handed to the executor.
        let executed = executed.lock().expect("executed log");
        assert!(!executed.iter().any(|n| n == "minify"));
        assert!(!executed.iter().any(|n| n == "publish"));

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failure_does_not_poison_later_runs() -> TestResult {
    with_timeout(async {
        init_tracing();

        let graph = chain_with_bystander();
        let mut scheduler = Scheduler::new(graph.clone());

        // First run: generate fails.
        let run = scheduler.plan(&["publish"])?;
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor =
            FakeExecutor::new(settle_tx, Arc::clone(&executed)).fail_task("generate", "boom");
        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 0).await?;
        assert!(report.failed);

        // Second run (the operator fixed the input and resaved): everything
        // goes through. This is what keeps a watch session alive.
        let run = scheduler.plan(&["publish"])?;
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor = FakeExecutor::new(settle_tx, Arc::clone(&executed));
        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 0).await?;

        assert!(!report.failed);
        assert_eq!(report.states["generate"], TaskState::Succeeded);
        assert_eq!(report.states["minify"], TaskState::Succeeded);
        assert_eq!(report.states["publish"], TaskState::Succeeded);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_requested_leaf_fails_the_run_without_cascade() -> TestResult {
    with_timeout(async {
        init_tracing();

        let graph = chain_with_bystander();
        let mut scheduler = Scheduler::new(graph.clone());
        let run = scheduler.plan(&["fonts"])?;

        let executed = Arc::new(Mutex::new(Vec::new()));
        let (settle_tx, mut settle_rx) = mpsc::channel(16);
        let mut executor =
            FakeExecutor::new(settle_tx, Arc::clone(&executed)).fail_task("fonts", "copy error");

        let report = drive_run(&graph, run, &mut executor, &mut settle_rx, 0).await?;

        assert!(report.failed);
        assert_eq!(report.states.len(), 1);
        assert_eq!(report.states["fonts"], TaskState::Failed);

        Ok(())
    })
    .await
}
