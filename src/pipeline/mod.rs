// src/pipeline/mod.rs

//! Pipeline composition: one-shot builds and the resident watch session.
//!
//! Components are wired as a unidirectional message pipeline: the watcher
//! emits [`ChangeBatch`]es, the scheduler consumes them and produces run
//! reports, the reload broadcaster consumes those. No callback chains, no
//! ambient state: the [`Orchestrator`] is constructed at process start and
//! passed by reference to whoever drives it.
//!
//! - [`executor`] owns the seam between the scheduler and the transforms.
//! - [`driver`] is the dispatch/settle loop for one run.
//! - [`watch_mode`] keeps rebuilding and notifying until shutdown.

pub mod driver;
pub mod executor;
pub mod watch_mode;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::dag::{TaskGraph, TaskName};
use crate::errors::Result;
use crate::sched::{FingerprintStore, RunReport, Scheduler};

pub use driver::drive_run;
pub use executor::{TaskExecutor, TaskSettled, TransformExecutor};
pub use watch_mode::watch_session;

/// One coalesced batch of source changes, as emitted by the debouncer.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Union of task names triggered by the batch, de-duplicated.
    pub tasks: BTreeSet<TaskName>,
    /// Changed paths (relative to the source root), for diagnostics.
    pub paths: Vec<String>,
}

/// Explicitly constructed pipeline state: the sealed graph behind its
/// scheduler, the roots, and the fingerprint store shared across runs.
///
/// Created once at startup, torn down at shutdown; both operating modes
/// borrow it rather than reaching for globals.
pub struct Orchestrator {
    scheduler: Scheduler,
    source_root: PathBuf,
    parallelism: usize,
    fingerprints: Arc<Mutex<Box<dyn FingerprintStore>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tasks", &self.scheduler.graph().len())
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        graph: TaskGraph,
        source_root: impl Into<PathBuf>,
        parallelism: usize,
        mut fingerprints: Box<dyn FingerprintStore>,
    ) -> Self {
        // Drop fingerprints of tasks that no longer exist (renamed/removed).
        let active: Vec<&str> = graph.names().collect();
        if let Err(err) = fingerprints.prune(&active) {
            tracing::warn!(error = %err, "failed to prune stale fingerprints");
        }

        Self {
            scheduler: Scheduler::new(graph),
            source_root: source_root.into(),
            parallelism,
            fingerprints: Arc::new(Mutex::new(fingerprints)),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        self.scheduler.graph()
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Plan and drive one run of the requested tasks (plus their transitive
    /// dependencies). With `incremental` set, tasks whose inputs are
    /// provably unchanged since their last successful run are skipped.
    pub async fn run_once<S: AsRef<str>>(
        &mut self,
        requested: &[S],
        incremental: bool,
    ) -> Result<RunReport> {
        let run = self.scheduler.plan(requested)?;

        let (settle_tx, mut settle_rx) = mpsc::channel(64);
        let mut executor = TransformExecutor::new(
            settle_tx,
            self.source_root.clone(),
            Arc::clone(&self.fingerprints),
            incremental,
        );

        drive_run(
            self.scheduler.graph(),
            run,
            &mut executor,
            &mut settle_rx,
            self.parallelism,
        )
        .await
    }
}
