// src/dag/registry.rs

//! Task registration and pre-run validation.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::graph::TaskGraph;
use crate::dag::task::TaskSpec;
use crate::errors::{PipelineError, Result};

/// Collects task definitions before any run.
///
/// Duplicate names are rejected at registration; unknown `after` references
/// and cycles are rejected when the registry seals. Nothing graph-shaped can
/// fail at run time.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    specs: Vec<TaskSpec>,
    names: HashSet<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Register a task definition.
    ///
    /// Registration order is remembered: it is the tie-break for the
    /// topological execution order.
    pub fn register(&mut self, spec: TaskSpec) -> Result<()> {
        if !self.names.insert(spec.name.clone()) {
            return Err(PipelineError::DuplicateTask(spec.name));
        }
        debug!(task = %spec.name, deps = ?spec.after, "registered task");
        self.specs.push(spec);
        Ok(())
    }

    /// Validate references and acyclicity, then build the sealed [`TaskGraph`].
    pub fn seal(self) -> Result<TaskGraph> {
        self.validate_references()?;
        self.validate_acyclic()?;
        TaskGraph::build(self.specs)
    }

    fn validate_references(&self) -> Result<()> {
        for spec in &self.specs {
            for dep in &spec.after {
                if !self.names.contains(dep) {
                    return Err(PipelineError::Config(format!(
                        "task '{}' has unknown dependency '{}' in `after`",
                        spec.name, dep
                    )));
                }
                if dep == &spec.name {
                    return Err(PipelineError::Config(format!(
                        "task '{}' cannot depend on itself in `after`",
                        spec.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for spec in &self.specs {
            graph.add_node(spec.name.as_str());
        }
        for spec in &self.specs {
            for dep in &spec.after {
                graph.add_edge(dep.as_str(), spec.name.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(PipelineError::GraphCycle(cycle.node_id().to_string())),
        }
    }
}
