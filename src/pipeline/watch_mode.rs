// src/pipeline/watch_mode.rs

//! The resident watch session.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dag::TaskName;
use crate::errors::Result;
use crate::pipeline::{ChangeBatch, Orchestrator};
use crate::reload::ReloadBroadcaster;
use crate::sched::RunReport;
use crate::watch::{spawn_watcher, RuleSet};

/// Build everything once, then stay resident: change batches from the
/// watcher drive incremental re-runs, each settled run pushes at most one
/// reload signal. Run failures are reported and never end the session; only
/// shutdown (Ctrl-C) or watcher teardown does.
pub async fn watch_session(
    orch: &mut Orchestrator,
    rules: RuleSet,
    window: Duration,
    broadcaster: ReloadBroadcaster,
) -> Result<()> {
    // Initial full (but incremental) build.
    let all: Vec<String> = orch.graph().names().map(str::to_string).collect();
    match orch.run_once(&all, true).await {
        Ok(report) => finish_run(&broadcaster, &report),
        Err(err) => warn!(error = %err, "initial build failed; watching anyway"),
    }

    let (batch_tx, mut batch_rx) = mpsc::channel::<ChangeBatch>(16);
    let watcher = spawn_watcher(orch.source_root().to_path_buf(), rules, batch_tx, window)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("watching for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown requested");
                break;
            }
            batch = batch_rx.recv() => {
                let Some(batch) = batch else {
                    // Watcher side of the pipeline went away.
                    break;
                };
                rebuild(orch, &broadcaster, batch).await;
            }
        }
    }

    watcher.stop();
    info!("watch session finished");
    Ok(())
}

async fn rebuild(orch: &mut Orchestrator, broadcaster: &ReloadBroadcaster, batch: ChangeBatch) {
    let tasks: Vec<TaskName> = batch.tasks.into_iter().collect();
    info!(
        ?tasks,
        changes = batch.paths.len(),
        "source changes detected; rebuilding"
    );

    match orch.run_once(&tasks, true).await {
        Ok(report) => finish_run(broadcaster, &report),
        Err(err) => warn!(error = %err, "rebuild failed; watch session continues"),
    }
}

fn finish_run(broadcaster: &ReloadBroadcaster, report: &RunReport) {
    if report.failed {
        for (task, cause) in &report.failures {
            warn!(task = %task, cause = %cause, "task failed");
        }
        warn!(
            run_id = report.run_id,
            "run finished with failures; fix and resave to retry"
        );
    }

    // Exactly one notification per settled run, carrying the union of
    // outputs the run's succeeded tasks produced.
    broadcaster.notify(&report.affected);
}
