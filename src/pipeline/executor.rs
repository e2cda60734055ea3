// src/pipeline/executor.rs

//! The executor seam between the scheduler and the transforms.
//!
//! The run driver talks to a [`TaskExecutor`] instead of invoking transforms
//! directly, so tests can substitute a fake that settles tasks instantly.
//! The production [`TransformExecutor`] resolves each task's input set,
//! applies the freshness check, invokes the transform and reports exactly
//! one [`TaskSettled`] per dispatched task.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::dag::{ScheduledTask, TaskName, TaskOutcome};
use crate::errors::Result;
use crate::fsutil::collect_matching_files;
use crate::sched::{aggregate_fingerprint, FingerprintStore};
use crate::watch::build_globset;

/// A task settled; carries the outcome back to the run driver.
#[derive(Debug, Clone)]
pub struct TaskSettled {
    pub task: TaskName,
    pub run_id: u64,
    pub outcome: TaskOutcome,
}

/// Trait abstracting how scheduled tasks are executed.
///
/// Implementations must eventually emit exactly one [`TaskSettled`] per
/// dispatched task; the driver counts on it to know when the run is done.
pub trait TaskExecutor: Send {
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production executor: one tokio task per dispatched build task.
pub struct TransformExecutor {
    settle_tx: mpsc::Sender<TaskSettled>,
    source_root: PathBuf,
    fingerprints: Arc<Mutex<Box<dyn FingerprintStore>>>,
    incremental: bool,
}

impl TransformExecutor {
    pub fn new(
        settle_tx: mpsc::Sender<TaskSettled>,
        source_root: PathBuf,
        fingerprints: Arc<Mutex<Box<dyn FingerprintStore>>>,
        incremental: bool,
    ) -> Self {
        Self {
            settle_tx,
            source_root,
            fingerprints,
            incremental,
        }
    }
}

impl TaskExecutor for TransformExecutor {
    fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let settle_tx = self.settle_tx.clone();
        let source_root = self.source_root.clone();
        let fingerprints = Arc::clone(&self.fingerprints);
        let incremental = self.incremental;

        Box::pin(async move {
            for task in tasks {
                tokio::spawn(execute_task(
                    task,
                    source_root.clone(),
                    Arc::clone(&fingerprints),
                    incremental,
                    settle_tx.clone(),
                ));
            }
            Ok(())
        })
    }
}

/// What input resolution decided for one task.
enum Resolved {
    /// Inputs unchanged since the last successful run.
    Fresh,
    /// Run the transform on these files; save `fingerprint` on success.
    Run {
        inputs: Vec<PathBuf>,
        fingerprint: Option<String>,
    },
}

async fn execute_task(
    task: ScheduledTask,
    source_root: PathBuf,
    fingerprints: Arc<Mutex<Box<dyn FingerprintStore>>>,
    incremental: bool,
    settle_tx: mpsc::Sender<TaskSettled>,
) {
    let name = task.name.clone();
    let run_id = task.run_id;

    let outcome = match execute_task_inner(task, source_root, fingerprints, incremental).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let message = format!("{err:#}");
            error!(task = %name, run_id, error = %message, "task execution error");
            TaskOutcome::Failed { message }
        }
    };

    let _ = settle_tx
        .send(TaskSettled {
            task: name,
            run_id,
            outcome,
        })
        .await;
}

async fn execute_task_inner(
    task: ScheduledTask,
    source_root: PathBuf,
    fingerprints: Arc<Mutex<Box<dyn FingerprintStore>>>,
    incremental: bool,
) -> anyhow::Result<TaskOutcome> {
    let resolved = resolve_inputs(&task, &source_root, &fingerprints, incremental).await?;

    let (inputs, fingerprint) = match resolved {
        Resolved::Fresh => {
            debug!(task = %task.name, run_id = task.run_id, "inputs fresh; transform not run");
            return Ok(TaskOutcome::Fresh);
        }
        Resolved::Run { inputs, fingerprint } => (inputs, fingerprint),
    };

    debug!(
        task = %task.name,
        run_id = task.run_id,
        inputs = inputs.len(),
        "invoking transform"
    );

    match task.action.apply(inputs, task.dest.clone()).await {
        Ok(output) => {
            if let Some(fingerprint) = fingerprint {
                let mut store = fingerprints
                    .lock()
                    .map_err(|_| anyhow!("fingerprint store mutex poisoned"))?;
                store
                    .save(&task.name, &fingerprint)
                    .with_context(|| format!("saving fingerprint for task '{}'", task.name))?;
            }
            Ok(TaskOutcome::Succeeded {
                written: output.written,
            })
        }
        Err(err) => Ok(TaskOutcome::Failed {
            message: format!("{err:#}"),
        }),
    }
}

/// Resolve the task's input files and, in incremental mode, compare their
/// aggregate fingerprint against the one from the last successful run.
///
/// Runs on the blocking pool: it walks the source tree and hashes files.
async fn resolve_inputs(
    task: &ScheduledTask,
    source_root: &PathBuf,
    fingerprints: &Arc<Mutex<Box<dyn FingerprintStore>>>,
    incremental: bool,
) -> anyhow::Result<Resolved> {
    // A task with no declared inputs always runs; there is nothing to
    // fingerprint.
    if task.inputs.is_empty() {
        return Ok(Resolved::Run {
            inputs: Vec::new(),
            fingerprint: None,
        });
    }

    let name = task.name.clone();
    let patterns = task.inputs.clone();
    let excludes = task.exclude.clone();
    let root = source_root.clone();
    let store = Arc::clone(fingerprints);

    tokio::task::spawn_blocking(move || {
        let include = build_globset(&patterns)?;
        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(&excludes)?)
        };

        let inputs = collect_matching_files(&root, &include, exclude.as_ref())?;
        let fingerprint = aggregate_fingerprint(&inputs)?;

        if incremental {
            let store = store
                .lock()
                .map_err(|_| anyhow!("fingerprint store mutex poisoned"))?;
            if store.load(&name)?.as_deref() == Some(fingerprint.as_str()) {
                return Ok(Resolved::Fresh);
            }
        }

        Ok(Resolved::Run {
            inputs,
            fingerprint: Some(fingerprint),
        })
    })
    .await
    .context("input resolution task panicked")?
}
