// src/sched/run.rs

//! Per-run scheduling state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::dag::{SkipReason, TaskGraph, TaskName, TaskOutcome, TaskState};

/// Transient record of one scheduling pass.
///
/// Holds the requested task set, the selected dependency closure (in the
/// graph's deterministic topological order) and each selected task's state.
/// Created when a run is planned, discarded once [`PipelineRun::is_settled`]
/// and the report has been taken.
#[derive(Debug)]
pub struct PipelineRun {
    run_id: u64,
    requested: HashSet<TaskName>,
    /// Selection in topological order; drives deterministic dispatch order.
    order: Vec<TaskName>,
    states: HashMap<TaskName, TaskState>,
    /// Failure messages recorded for `Failed` tasks.
    failures: BTreeMap<TaskName, String>,
    /// Output locations written by succeeded tasks, in settle order.
    affected: Vec<PathBuf>,
}

impl PipelineRun {
    pub(crate) fn new(run_id: u64, requested: HashSet<TaskName>, order: Vec<TaskName>) -> Self {
        let states = order
            .iter()
            .map(|n| (n.clone(), TaskState::Pending))
            .collect();
        Self {
            run_id,
            requested,
            order,
            states,
            failures: BTreeMap::new(),
            affected: Vec::new(),
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Names selected for this run, in topological order.
    pub fn selection(&self) -> &[TaskName] {
        &self.order
    }

    pub fn state_of(&self, task: &str) -> Option<&TaskState> {
        self.states.get(task)
    }

    /// True once every selected task reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    /// Collect up to `budget` tasks that are `Pending` with all dependencies
    /// satisfied, marking them `Running`.
    ///
    /// Iterates the topological order, so ties between independent ready
    /// tasks resolve to registration order.
    pub fn take_ready(&mut self, graph: &TaskGraph, budget: usize) -> Vec<TaskName> {
        let mut ready = Vec::new();

        for name in &self.order {
            if ready.len() >= budget {
                break;
            }
            if !matches!(self.states.get(name), Some(TaskState::Pending)) {
                continue;
            }
            if self.deps_satisfied(graph, name) {
                ready.push(name.clone());
            }
        }

        for name in &ready {
            debug!(task = %name, run_id = self.run_id, "dependencies satisfied; marking Running");
            self.states.insert(name.clone(), TaskState::Running);
        }

        ready
    }

    fn deps_satisfied(&self, graph: &TaskGraph, task: &str) -> bool {
        graph.dependencies_of(task).iter().all(|dep| {
            self.states
                .get(dep)
                .map(|s| s.satisfies_dependents())
                .unwrap_or(false)
        })
    }

    /// Record a settled outcome for `task`.
    ///
    /// A failure immediately marks every transitive dependent in this run as
    /// `Skipped` with the failing task recorded as cause, so nothing runs
    /// against stale or absent inputs. Returns the newly skipped names.
    pub fn record(
        &mut self,
        graph: &TaskGraph,
        task: &str,
        outcome: TaskOutcome,
    ) -> Vec<TaskName> {
        match outcome {
            TaskOutcome::Succeeded { written } => {
                info!(task = %task, run_id = self.run_id, "task succeeded");
                self.states.insert(task.to_string(), TaskState::Succeeded);
                self.affected.extend(written);
                Vec::new()
            }
            TaskOutcome::Fresh => {
                info!(task = %task, run_id = self.run_id, "inputs unchanged; skipping task");
                self.states.insert(
                    task.to_string(),
                    TaskState::Skipped(SkipReason::FreshInputs),
                );
                Vec::new()
            }
            TaskOutcome::Failed { message } => {
                warn!(task = %task, run_id = self.run_id, cause = %message, "task failed");
                self.states.insert(task.to_string(), TaskState::Failed);
                self.failures.insert(task.to_string(), message);
                self.skip_dependents(graph, task)
            }
        }
    }

    /// Mark every non-terminal dependent (transitively) as skipped because of
    /// `failed_task`.
    fn skip_dependents(&mut self, graph: &TaskGraph, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = graph.dependents_of(failed_task).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(name) = stack.pop() {
            match self.states.get(&name) {
                Some(TaskState::Pending) | Some(TaskState::Running) => {
                    debug!(
                        task = %name,
                        cause = %failed_task,
                        "skipping dependent of failed task"
                    );
                    self.states.insert(
                        name.clone(),
                        TaskState::Skipped(SkipReason::UpstreamFailed(failed_task.to_string())),
                    );
                    stack.extend(graph.dependents_of(&name).iter().cloned());
                    newly_skipped.push(name);
                }
                // Already terminal, or not part of this run's selection.
                _ => {}
            }
        }

        newly_skipped
    }

    /// Snapshot the run result. Meaningful once settled.
    pub fn report(&self) -> RunReport {
        let states: BTreeMap<TaskName, TaskState> = self
            .states
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // The run fails when a *requested* task failed outright or was
        // skipped because something upstream of it failed. A fresh-skip of a
        // requested task is success.
        let failed = self.requested.iter().any(|name| {
            matches!(
                self.states.get(name),
                Some(TaskState::Failed) | Some(TaskState::Skipped(SkipReason::UpstreamFailed(_)))
            )
        });

        RunReport {
            run_id: self.run_id,
            failed,
            states,
            failures: self.failures.clone(),
            affected: self.affected.clone(),
        }
    }
}

/// Aggregated result of one settled run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    /// Whether the run as a whole failed (see [`PipelineRun::report`]).
    pub failed: bool,
    pub states: BTreeMap<TaskName, TaskState>,
    /// Failure messages keyed by failed task name.
    pub failures: BTreeMap<TaskName, String>,
    /// Output locations written by succeeded tasks.
    pub affected: Vec<PathBuf>,
}

impl RunReport {
    /// Count of tasks in the given terminal state family, for log summaries.
    pub fn count(&self, pred: impl Fn(&TaskState) -> bool) -> usize {
        self.states.values().filter(|s| pred(s)).count()
    }
}
