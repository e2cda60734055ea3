// tests/freshness_skip.rs

//! Incremental re-runs: unchanged inputs mean skipped tasks and a
//! byte-identical output tree.

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use sitepipe::dag::{SkipReason, TaskRegistry, TaskState};
use sitepipe::pipeline::Orchestrator;
use sitepipe::sched::MemoryFingerprintStore;
use sitepipe::transform::CopyTransform;
use sitepipe_test_utils::builders::SpecBuilder;
use sitepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write(path: &Path, contents: &str) -> TestResult {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[tokio::test]
async fn unchanged_inputs_skip_and_leave_outputs_byte_identical() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let source_root = dir.path().join("src");
        let dest = dir.path().join("dist/assets/fonts");

        write(&source_root.join("assets/fonts/body.woff2"), "body-font")?;
        write(&source_root.join("assets/fonts/head.woff2"), "head-font")?;

        let mut registry = TaskRegistry::new();
        registry.register(
            SpecBuilder::new("fonts")
                .input("assets/fonts/**")
                .dest(dest.clone())
                .action(Arc::new(CopyTransform::new(
                    source_root.clone(),
                    Some("assets/fonts".into()),
                )))
                .build(),
        )?;
        let graph = registry.seal()?;

        let mut orch = Orchestrator::new(
            graph,
            source_root.clone(),
            0,
            Box::new(MemoryFingerprintStore::new()),
        );

        // First run copies everything.
        let report = orch.run_once(&["fonts"], true).await?;
        assert!(!report.failed);
        assert_eq!(report.states["fonts"], TaskState::Succeeded);
        assert_eq!(fs::read_to_string(dest.join("body.woff2"))?, "body-font");
        assert_eq!(fs::read_to_string(dest.join("head.woff2"))?, "head-font");

        let before = (
            fs::read(dest.join("body.woff2"))?,
            fs::read(dest.join("head.woff2"))?,
        );

        // Second run: nothing changed, so the task is skipped and the output
        // tree is untouched.
        let report = orch.run_once(&["fonts"], true).await?;
        assert!(!report.failed);
        assert_eq!(
            report.states["fonts"],
            TaskState::Skipped(SkipReason::FreshInputs)
        );
        assert!(report.affected.is_empty());

        let after = (
            fs::read(dest.join("body.woff2"))?,
            fs::read(dest.join("head.woff2"))?,
        );
        assert_eq!(before, after);

        Ok(())
    })
    .await
}

#[tokio::test]
async fn changed_input_re_runs_the_task() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let source_root = dir.path().join("src");
        let dest = dir.path().join("dist/assets/fonts");

        write(&source_root.join("assets/fonts/body.woff2"), "v1")?;

        let mut registry = TaskRegistry::new();
        registry.register(
            SpecBuilder::new("fonts")
                .input("assets/fonts/**")
                .dest(dest.clone())
                .action(Arc::new(CopyTransform::new(
                    source_root.clone(),
                    Some("assets/fonts".into()),
                )))
                .build(),
        )?;
        let graph = registry.seal()?;

        let mut orch = Orchestrator::new(
            graph,
            source_root.clone(),
            0,
            Box::new(MemoryFingerprintStore::new()),
        );

        let report = orch.run_once(&["fonts"], true).await?;
        assert_eq!(report.states["fonts"], TaskState::Succeeded);

        write(&source_root.join("assets/fonts/body.woff2"), "v2")?;

        let report = orch.run_once(&["fonts"], true).await?;
        assert_eq!(report.states["fonts"], TaskState::Succeeded);
        assert_eq!(fs::read_to_string(dest.join("body.woff2"))?, "v2");

        Ok(())
    })
    .await
}

#[tokio::test]
async fn non_incremental_run_ignores_fingerprints() -> TestResult {
    with_timeout(async {
        init_tracing();

        let dir = tempdir()?;
        let source_root = dir.path().join("src");
        let dest = dir.path().join("dist/assets/fonts");

        write(&source_root.join("assets/fonts/body.woff2"), "stable")?;

        let mut registry = TaskRegistry::new();
        registry.register(
            SpecBuilder::new("fonts")
                .input("assets/fonts/**")
                .dest(dest.clone())
                .action(Arc::new(CopyTransform::new(
                    source_root.clone(),
                    Some("assets/fonts".into()),
                )))
                .build(),
        )?;
        let graph = registry.seal()?;

        let mut orch = Orchestrator::new(
            graph,
            source_root.clone(),
            0,
            Box::new(MemoryFingerprintStore::new()),
        );

        orch.run_once(&["fonts"], true).await?;

        // `--force` semantics: run even though nothing changed.
        let report = orch.run_once(&["fonts"], false).await?;
        assert_eq!(report.states["fonts"], TaskState::Succeeded);

        Ok(())
    })
    .await
}
