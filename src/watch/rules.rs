// src/watch/rules.rs

use std::collections::BTreeSet;
use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::dag::{TaskGraph, TaskName};
use crate::errors::{PipelineError, Result};

/// One watch rule: glob patterns paired with the tasks to trigger when a
/// matching path changes.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub tasks: Vec<TaskName>,
}

/// A rule with its globs compiled.
struct CompiledRule {
    include: GlobSet,
    exclude: Option<GlobSet>,
    tasks: Vec<TaskName>,
}

/// The full compiled rule table the watcher matches paths against.
///
/// Multiple rules may match one path; [`RuleSet::tasks_for`] returns the
/// de-duplicated union of their task names.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

impl RuleSet {
    pub fn compile(rules: &[WatchRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            let include = build_globset(&rule.patterns)?;
            let exclude = if rule.exclude.is_empty() {
                None
            } else {
                Some(build_globset(&rule.exclude)?)
            };
            compiled.push(CompiledRule {
                include,
                exclude,
                tasks: rule.tasks.clone(),
            });
        }

        Ok(Self { rules: compiled })
    }

    /// One rule per task with declared inputs; tasks without inputs are not
    /// watch-triggerable.
    pub fn from_graph(graph: &TaskGraph) -> Result<Self> {
        let rules: Vec<WatchRule> = graph
            .tasks()
            .filter(|spec| !spec.inputs.is_empty())
            .map(|spec| WatchRule {
                patterns: spec.inputs.clone(),
                exclude: spec.exclude.clone(),
                tasks: vec![spec.name.clone()],
            })
            .collect();
        Self::compile(&rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All tasks triggered by a change at `rel_path` (relative to the watch
    /// root, forward slashes), de-duplicated and deterministically ordered.
    pub fn tasks_for(&self, rel_path: &str) -> BTreeSet<TaskName> {
        let mut tasks = BTreeSet::new();

        for rule in &self.rules {
            if !rule.include.is_match(rel_path) {
                continue;
            }
            if let Some(exclude) = &rule.exclude {
                if exclude.is_match(rel_path) {
                    continue;
                }
            }
            tasks.extend(rule.tasks.iter().cloned());
        }

        tasks
    }
}

/// Build a GlobSet from simple string patterns.
///
/// Malformed patterns surface as configuration errors.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|err| PipelineError::Config(format!("invalid glob pattern '{pat}': {err}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| PipelineError::Config(format!("building glob set: {err}")))
}
