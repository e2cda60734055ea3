// src/pipeline/driver.rs

//! The dispatch/settle loop for one pipeline run.

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::{ScheduledTask, TaskGraph};
use crate::errors::{PipelineError, Result};
use crate::pipeline::executor::{TaskExecutor, TaskSettled};
use crate::sched::{PipelineRun, RunReport};

/// Drive `run` to settlement.
///
/// Ready tasks are dispatched to the executor as soon as their dependencies
/// settle, up to `parallelism` in flight at once (`0` = unbounded). Task
/// completion ordering is determined solely by the dependency graph; sibling
/// tasks settle in whatever order their transforms finish.
pub async fn drive_run<E: TaskExecutor>(
    graph: &TaskGraph,
    mut run: PipelineRun,
    executor: &mut E,
    settle_rx: &mut mpsc::Receiver<TaskSettled>,
    parallelism: usize,
) -> Result<RunReport> {
    let bound = if parallelism == 0 {
        usize::MAX
    } else {
        parallelism
    };
    let mut in_flight: usize = 0;

    info!(
        run_id = run.run_id(),
        selected = run.selection().len(),
        "starting pipeline run"
    );

    loop {
        let budget = bound.saturating_sub(in_flight);
        let ready = run.take_ready(graph, budget);
        if !ready.is_empty() {
            let scheduled: Vec<ScheduledTask> = ready
                .iter()
                .filter_map(|name| graph.task(name))
                .map(|spec| ScheduledTask::from_spec(spec, run.run_id()))
                .collect();

            debug!(tasks = ?ready, run_id = run.run_id(), "dispatching ready tasks");
            in_flight += scheduled.len();
            executor.dispatch(scheduled).await?;
        }

        if run.is_settled() {
            break;
        }

        if in_flight == 0 {
            // Unreachable with a validated acyclic selection; bail rather
            // than wait forever if an executor broke its settle contract.
            return Err(PipelineError::Other(anyhow!(
                "run {} stalled with no tasks in flight",
                run.run_id()
            )));
        }

        let Some(settled) = settle_rx.recv().await else {
            return Err(PipelineError::Other(anyhow!(
                "executor settle channel closed mid-run"
            )));
        };

        if settled.run_id != run.run_id() {
            debug!(
                task = %settled.task,
                run_id = settled.run_id,
                "stale settle event from another run; ignoring"
            );
            continue;
        }

        in_flight -= 1;
        let skipped = run.record(graph, &settled.task, settled.outcome);
        if !skipped.is_empty() {
            debug!(?skipped, run_id = run.run_id(), "skipped dependents of failed task");
        }
    }

    let report = run.report();
    info!(
        run_id = report.run_id,
        failed = report.failed,
        "pipeline run settled"
    );
    Ok(report)
}
