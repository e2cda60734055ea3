// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig, TaskKind};
use crate::errors::{PipelineError, Result};
use crate::watch::rules::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.reload, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_fields(cfg)?;
    validate_task_globs(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipelineError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check that each task carries the fields its kind requires.
fn validate_task_fields(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        match task.kind {
            TaskKind::Shell => require(name, task.command.is_some(), "`command`")?,
            TaskKind::Copy => require(name, task.out.is_some(), "`out`")?,
            TaskKind::Bundle => {
                require(name, task.entry.is_some(), "`entry`")?;
                require(name, task.bundle.is_some(), "`bundle`")?;
            }
        }
    }
    Ok(())
}

fn require(task: &str, present: bool, field: &str) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "task '{task}' is missing {field}, required for its kind"
        )))
    }
}

/// Compile every task's glob lists once so malformed patterns are rejected
/// up front rather than mid-run.
fn validate_task_globs(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        glob_check(name, &task.inputs, "inputs")?;
        glob_check(name, &task.exclude, "exclude")?;
    }
    Ok(())
}

fn glob_check(task: &str, patterns: &[String], field: &str) -> Result<()> {
    build_globset(patterns).map_err(|err| {
        PipelineError::Config(format!("task '{task}' has a malformed {field} glob: {err}"))
    })?;
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(PipelineError::Config(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(PipelineError::Config(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so a topological sort fails exactly when
    // the `after` lists contain a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PipelineError::GraphCycle(cycle.node_id().to_string())),
    }
}

/// Used by dry-run output to describe a task in one line.
pub fn describe_task(task: &TaskConfig) -> String {
    match task.kind {
        TaskKind::Shell => format!("shell: {}", task.command.as_deref().unwrap_or("")),
        TaskKind::Copy => format!("copy -> {}", task.out.as_deref().unwrap_or("")),
        TaskKind::Bundle => format!(
            "bundle: {} -> {}",
            task.entry.as_deref().unwrap_or(""),
            task.bundle.as_deref().unwrap_or("")
        ),
    }
}
