// src/dag/task.rs

//! Task records and per-run state types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::transform::Transform;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Definition of one build task: identity, dependencies, declared inputs and
/// the transform step that does the actual work.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: TaskName,
    /// Direct dependencies; this task starts only after all of them settled.
    pub after: Vec<TaskName>,
    /// Input glob patterns, relative to the source root. Drive freshness
    /// checks and watch triggering. A task with no inputs always runs.
    pub inputs: Vec<String>,
    /// Glob patterns excluded from `inputs`.
    pub exclude: Vec<String>,
    /// Destination directory handed to the transform.
    pub dest: PathBuf,
    /// The external transform step invoked for this task.
    pub action: Arc<dyn Transform>,
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// Why a task was skipped instead of run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Declared inputs are unchanged since the task's last successful run.
    FreshInputs,
    /// The named upstream task failed in this run.
    UpstreamFailed(TaskName),
}

/// Per-run state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Selected for this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }

    /// Whether a dependent may start once its dependency reached this state.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Skipped(SkipReason::FreshInputs)
        )
    }
}

/// Outcome reported by the executor when a task settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The transform ran and produced the listed output locations.
    Succeeded { written: Vec<PathBuf> },
    /// The transform failed; `message` describes the cause.
    Failed { message: String },
    /// Inputs were provably unchanged; the transform was not run.
    Fresh,
}

/// Description of a task the scheduler wants the executor to run now.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// Monotonically increasing run identifier. All tasks that belong to the
    /// same pipeline run share the same `run_id`.
    pub run_id: u64,
    pub inputs: Vec<String>,
    pub exclude: Vec<String>,
    pub dest: PathBuf,
    pub action: Arc<dyn Transform>,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl ScheduledTask {
    pub fn from_spec(spec: &TaskSpec, run_id: u64) -> Self {
        Self {
            name: spec.name.clone(),
            run_id,
            inputs: spec.inputs.clone(),
            exclude: spec.exclude.clone(),
            dest: spec.dest.clone(),
            action: Arc::clone(&spec.action),
        }
    }
}
