// src/lib.rs

pub mod bundle;
pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod fsutil;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod sched;
pub mod transform;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cli::{CliArgs, Mode};
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, FingerprintStorageMode, TaskKind};
use crate::config::validate::describe_task;
use crate::dag::{TaskGraph, TaskRegistry, TaskSpec, TaskState};
use crate::errors::{PipelineError, Result};
use crate::pipeline::{watch_session, Orchestrator};
use crate::reload::{spawn_reload_server, ReloadBroadcaster};
use crate::sched::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore, RunReport};
use crate::transform::{
    BundleTransform, CopyTransform, ScriptCompiler, ShellTransform, Transform,
};
use crate::watch::RuleSet;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - registry / graph / orchestrator
/// - (watch mode) file watcher, debouncer and live-reload server
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let graph = registry_from_config(&cfg, &root)?.seal()?;

    match args.mode {
        Mode::Build { force } => run_build(&cfg, &root, graph, force).await,
        Mode::Watch => run_watch(&cfg, &root, graph).await,
    }
}

/// One-shot build: run the whole graph once. Fails (non-zero exit via
/// `main`) if any requested task failed or was skipped by an upstream
/// failure.
async fn run_build(cfg: &ConfigFile, root: &Path, graph: TaskGraph, force: bool) -> Result<()> {
    let mut orch = make_orchestrator(cfg, root, graph);

    let all: Vec<String> = orch.graph().names().map(str::to_string).collect();
    let report = orch.run_once(&all, !force).await?;

    summarize(&report);

    if report.failed {
        let (task, message) = report
            .failures
            .iter()
            .next()
            .map(|(t, m)| (t.clone(), m.clone()))
            .unwrap_or_else(|| {
                (
                    "<requested>".to_string(),
                    "a requested task was skipped due to an upstream failure".to_string(),
                )
            });
        return Err(PipelineError::Transform { task, message });
    }

    Ok(())
}

/// Watch mode: build once, then stay resident until Ctrl-C.
async fn run_watch(cfg: &ConfigFile, root: &Path, graph: TaskGraph) -> Result<()> {
    let rules = RuleSet::from_graph(&graph)?;
    let mut orch = make_orchestrator(cfg, root, graph);

    let out_root = root.join(&cfg.config.out_dir);
    let broadcaster = ReloadBroadcaster::new(out_root);

    let server = if cfg.reload.enabled {
        Some(spawn_reload_server(&cfg.reload.addr, broadcaster.clone()).await?)
    } else {
        None
    };

    let window = Duration::from_millis(cfg.config.debounce_ms);
    let result = watch_session(&mut orch, rules, window, broadcaster).await;

    if let Some(server) = server {
        server.stop();
    }

    result
}

fn make_orchestrator(cfg: &ConfigFile, root: &Path, graph: TaskGraph) -> Orchestrator {
    let source_root = root.join(&cfg.config.source_dir);

    let fingerprints: Box<dyn FingerprintStore> = match cfg.config.fingerprint_storage {
        FingerprintStorageMode::File => Box::new(FileFingerprintStore::new(root.to_path_buf())),
        FingerprintStorageMode::Memory => Box::new(MemoryFingerprintStore::new()),
    };

    Orchestrator::new(graph, source_root, cfg.config.parallelism, fingerprints)
}

/// Map a validated config onto a task registry: each `[task.<name>]`
/// becomes a [`TaskSpec`] wired to one of the shipped transforms.
pub fn registry_from_config(cfg: &ConfigFile, root: &Path) -> Result<TaskRegistry> {
    let source_root = root.join(&cfg.config.source_dir);
    let out_root = root.join(&cfg.config.out_dir);

    let mut registry = TaskRegistry::new();

    for (name, task) in cfg.task.iter() {
        let dest = match &task.out {
            Some(out) => out_root.join(out),
            None => out_root.clone(),
        };

        let action: Arc<dyn Transform> = match task.kind {
            TaskKind::Shell => {
                let command = require_field(name, task.command.as_ref(), "command")?;
                Arc::new(ShellTransform::new(command.clone(), root.to_path_buf()))
            }
            TaskKind::Copy => Arc::new(CopyTransform::new(
                source_root.clone(),
                task.base.as_ref().map(PathBuf::from),
            )),
            TaskKind::Bundle => {
                let entry = require_field(name, task.entry.as_ref(), "entry")?;
                let bundle = require_field(name, task.bundle.as_ref(), "bundle")?;
                let bundler = bundle::Bundler::new(
                    source_root.clone(),
                    entry.clone(),
                    out_root.join(bundle),
                    Arc::new(ScriptCompiler::new()),
                );
                Arc::new(BundleTransform::new(bundler))
            }
        };

        registry.register(TaskSpec {
            name: name.clone(),
            after: task.after.clone(),
            inputs: task.inputs.clone(),
            exclude: task.exclude.clone(),
            dest,
            action,
        })?;
    }

    Ok(registry)
}

fn require_field<'a, T>(task: &str, field: Option<&'a T>, name: &str) -> Result<&'a T> {
    field.ok_or_else(|| {
        PipelineError::Config(format!(
            "task '{task}' is missing `{name}`, required for its kind"
        ))
    })
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Sitepipe.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Sitepipe.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn summarize(report: &RunReport) {
    let succeeded = report.count(|s| matches!(s, TaskState::Succeeded));
    let skipped = report.count(|s| matches!(s, TaskState::Skipped(_)));
    let failed = report.count(|s| matches!(s, TaskState::Failed));

    info!(
        run_id = report.run_id,
        succeeded, skipped, failed, "build finished"
    );

    for (task, cause) in &report.failures {
        tracing::error!(task = %task, cause = %cause, "task failed");
    }
}

/// Simple dry-run output: print tasks, dependencies and transforms.
fn print_dry_run(cfg: &ConfigFile) {
    println!("sitepipe dry-run");
    println!("  config.parallelism = {}", cfg.config.parallelism);
    println!("  config.debounce_ms = {}", cfg.config.debounce_ms);
    println!("  config.source_dir  = {}", cfg.config.source_dir);
    println!("  config.out_dir     = {}", cfg.config.out_dir);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      {}", describe_task(task));
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.inputs.is_empty() {
            println!("      inputs: {:?}", task.inputs);
        }
        if !task.exclude.is_empty() {
            println!("      exclude: {:?}", task.exclude);
        }
        if let Some(ref out) = task.out {
            println!("      out: {out}");
        }
    }
}
