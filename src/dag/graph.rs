// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};

use crate::dag::task::{TaskName, TaskSpec};
use crate::errors::{PipelineError, Result};

/// Sealed, validated task DAG.
///
/// Acyclicity and reference validity are checked when the registry seals
/// (see [`crate::dag::registry`]); here we keep adjacency information plus
/// the one deterministic topological order used by every run. Ties between
/// independent tasks are broken by registration order, so execution order
/// never depends on incidental map iteration.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: HashMap<TaskName, TaskSpec>,
    dependents: HashMap<TaskName, Vec<TaskName>>,
    /// Registration order, used for tie-breaking and display.
    registration: Vec<TaskName>,
    /// Full topological order over all tasks.
    topo: Vec<TaskName>,
}

impl TaskGraph {
    /// Build a graph from specs in registration order.
    ///
    /// Assumes `after` references were validated by the registry; still
    /// reports a cycle defensively if one slipped through.
    pub(crate) fn build(specs: Vec<TaskSpec>) -> Result<Self> {
        let registration: Vec<TaskName> = specs.iter().map(|s| s.name.clone()).collect();

        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        for spec in &specs {
            dependents.entry(spec.name.clone()).or_default();
        }
        for spec in &specs {
            for dep in &spec.after {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(spec.name.clone());
            }
        }

        let topo = topological_order(&specs, &registration)?;

        let tasks = specs.into_iter().map(|s| (s.name.clone(), s)).collect();

        Ok(Self {
            tasks,
            dependents,
            registration,
            topo,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }

    /// All task specs, in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.registration.iter().filter_map(|n| self.tasks.get(n))
    }

    /// All task names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registration.iter().map(|s| s.as_str())
    }

    /// Immediate dependencies of a task (its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|s| s.after.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in `after`).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// The requested tasks plus every transitive dependency, in the graph's
    /// deterministic topological order.
    ///
    /// Fails with [`PipelineError::UnknownTask`] for unregistered names.
    pub fn dependency_closure<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<TaskName>> {
        let mut selected: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for name in requested {
            let name = name.as_ref();
            if !self.tasks.contains_key(name) {
                return Err(PipelineError::UnknownTask(name.to_string()));
            }
            stack.push(name);
        }

        while let Some(name) = stack.pop() {
            if !selected.insert(name) {
                continue;
            }
            for dep in self.dependencies_of(name) {
                stack.push(dep.as_str());
            }
        }

        Ok(self
            .topo
            .iter()
            .filter(|n| selected.contains(n.as_str()))
            .cloned()
            .collect())
    }
}

/// Kahn's algorithm with the ready set ordered by registration index.
fn topological_order(specs: &[TaskSpec], registration: &[TaskName]) -> Result<Vec<TaskName>> {
    let position: HashMap<&str, usize> = registration
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for spec in specs {
        indegree.entry(spec.name.as_str()).or_insert(0);
    }
    for spec in specs {
        for dep in &spec.after {
            *indegree.entry(spec.name.as_str()).or_insert(0) += 1;
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(spec.name.as_str());
        }
    }

    // A VecDeque keyed by registration position keeps the ready set sorted;
    // graphs are small enough that a linear re-sort per insertion is fine.
    let mut ready: VecDeque<&str> = specs
        .iter()
        .filter(|s| indegree[s.name.as_str()] == 0)
        .map(|s| s.name.as_str())
        .collect();

    let mut order: Vec<TaskName> = Vec::with_capacity(specs.len());

    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for &dependent in dependents.get(name).map(|d| d.as_slice()).unwrap_or(&[]) {
            let entry = indegree
                .get_mut(dependent)
                .ok_or_else(|| PipelineError::UnknownTask(dependent.to_string()))?;
            *entry -= 1;
            if *entry == 0 {
                let pos = position[dependent];
                let at = ready
                    .iter()
                    .position(|r| position[r] > pos)
                    .unwrap_or(ready.len());
                ready.insert(at, dependent);
            }
        }
    }

    if order.len() != specs.len() {
        let stuck = specs
            .iter()
            .map(|s| s.name.as_str())
            .find(|n| !order.iter().any(|o| o == n))
            .unwrap_or("<unknown>");
        return Err(PipelineError::GraphCycle(stuck.to_string()));
    }

    Ok(order)
}
