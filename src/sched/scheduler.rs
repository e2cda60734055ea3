// src/sched/scheduler.rs

use std::collections::HashSet;

use tracing::debug;

use crate::dag::{TaskGraph, TaskName};
use crate::errors::Result;
use crate::sched::run::PipelineRun;

/// Plans pipeline runs over the sealed task graph.
///
/// The scheduler itself holds no shared mutable state beyond the run
/// counter; each [`PipelineRun`] exclusively owns its task-state table.
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    /// Monotonically increasing run ID.
    run_counter: u64,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            graph,
            run_counter: 0,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Plan a run for the requested tasks: the selection is their transitive
    /// dependency closure, ordered topologically (ties broken by
    /// registration order).
    pub fn plan<S: AsRef<str>>(&mut self, requested: &[S]) -> Result<PipelineRun> {
        let order = self.graph.dependency_closure(requested)?;
        let requested: HashSet<TaskName> =
            requested.iter().map(|s| s.as_ref().to_string()).collect();

        self.run_counter += 1;
        debug!(
            run_id = self.run_counter,
            selected = order.len(),
            "planned pipeline run"
        );

        Ok(PipelineRun::new(self.run_counter, requested, order))
    }
}
