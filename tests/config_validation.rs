// tests/config_validation.rs

//! Configuration errors are fatal at startup, never at run time.

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use sitepipe::config::{load_and_validate, FingerprintStorageMode, TaskKind};
use sitepipe::dag::TaskRegistry;
use sitepipe::errors::PipelineError;
use sitepipe_test_utils::builders::{ConfigFileBuilder, SpecBuilder, TaskConfigBuilder};
use sitepipe_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn cyclic_dependencies_are_rejected() {
    init_tracing();

    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::shell("echo a").after("b").build())
        .with_task("b", TaskConfigBuilder::shell("echo b").after("c").build())
        .with_task("c", TaskConfigBuilder::shell("echo c").after("a").build())
        .try_build()
        .expect_err("cycle must be rejected");

    assert!(matches!(err, PipelineError::GraphCycle(_)));
}

#[test]
fn unknown_dependency_is_rejected() {
    init_tracing();

    let err = ConfigFileBuilder::new()
        .with_task(
            "styles",
            TaskConfigBuilder::shell("sassc").after("ghost").build(),
        )
        .try_build()
        .expect_err("unknown dep must be rejected");

    match err {
        PipelineError::Config(msg) => assert!(msg.contains("unknown dependency 'ghost'")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_rejected() {
    init_tracing();

    let err = ConfigFileBuilder::new()
        .with_task(
            "styles",
            TaskConfigBuilder::shell("sassc").after("styles").build(),
        )
        .try_build()
        .expect_err("self dep must be rejected");

    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn malformed_glob_is_rejected() {
    init_tracing();

    let err = ConfigFileBuilder::new()
        .with_task(
            "styles",
            TaskConfigBuilder::shell("sassc").input("src/[").build(),
        )
        .try_build()
        .expect_err("malformed glob must be rejected");

    match err {
        PipelineError::Config(msg) => assert!(msg.contains("malformed")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn per_kind_required_fields_are_enforced() {
    init_tracing();

    for (kind, field) in [
        (TaskKind::Shell, "`command`"),
        (TaskKind::Copy, "`out`"),
        (TaskKind::Bundle, "`entry`"),
    ] {
        let err = ConfigFileBuilder::new()
            .with_task("t", TaskConfigBuilder::bare(kind).build())
            .try_build()
            .expect_err("missing field must be rejected");

        match err {
            PipelineError::Config(msg) => {
                assert!(msg.contains(field), "{msg} should mention {field}")
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}

#[test]
fn empty_task_table_is_rejected() {
    init_tracing();

    let err = ConfigFileBuilder::new()
        .try_build()
        .expect_err("empty config must be rejected");
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn duplicate_registration_is_rejected() {
    init_tracing();

    let mut registry = TaskRegistry::new();
    registry
        .register(SpecBuilder::new("styles").build())
        .expect("first registration");

    let err = registry
        .register(SpecBuilder::new("styles").build())
        .expect_err("duplicate must be rejected");
    assert!(matches!(err, PipelineError::DuplicateTask(name) if name == "styles"));
}

#[test]
fn registry_seal_detects_cycles_before_any_run() {
    init_tracing();

    let mut registry = TaskRegistry::new();
    registry
        .register(SpecBuilder::new("a").after("b").build())
        .expect("register a");
    registry
        .register(SpecBuilder::new("b").after("a").build())
        .expect("register b");

    let err = registry.seal().expect_err("cycle must be rejected at seal");
    assert!(matches!(err, PipelineError::GraphCycle(_)));
}

#[test]
fn toml_defaults_round_trip() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Sitepipe.toml");
    fs::write(
        &path,
        r#"
[task.pages]
kind = "shell"
command = "jekyll build -s src -d dist"
inputs = ["**/*.md", "**/*.html"]

[task.fonts]
kind = "copy"
out = "assets/fonts"
base = "assets/fonts"
inputs = ["assets/fonts/**"]

[task.scripts]
kind = "bundle"
entry = "assets/scripts/main.js"
bundle = "assets/scripts/bundle.js"
inputs = ["assets/scripts/**/*.js"]
after = ["pages"]
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    // [config] and [reload] fall back to defaults.
    assert_eq!(cfg.config.parallelism, 0);
    assert_eq!(cfg.config.debounce_ms, 200);
    assert_eq!(cfg.config.source_dir, "src");
    assert_eq!(cfg.config.out_dir, "dist");
    assert_eq!(
        cfg.config.fingerprint_storage,
        FingerprintStorageMode::Memory
    );
    assert!(cfg.reload.enabled);

    assert_eq!(cfg.task.len(), 3);
    assert_eq!(cfg.task["pages"].kind, TaskKind::Shell);
    assert_eq!(cfg.task["fonts"].kind, TaskKind::Copy);
    assert_eq!(cfg.task["scripts"].kind, TaskKind::Bundle);
    assert_eq!(cfg.task["scripts"].after, vec!["pages".to_string()]);

    Ok(())
}

#[test]
fn explicit_sections_override_defaults() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let path = dir.path().join("Sitepipe.toml");
    fs::write(
        &path,
        r#"
[config]
parallelism = 2
debounce_ms = 150
fingerprint_storage = "file"
source_dir = "site"
out_dir = "public"

[reload]
enabled = false
addr = "127.0.0.1:4100"

[task.pages]
kind = "shell"
command = "echo build"
"#,
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.config.parallelism, 2);
    assert_eq!(cfg.config.debounce_ms, 150);
    assert_eq!(cfg.config.fingerprint_storage, FingerprintStorageMode::File);
    assert_eq!(cfg.config.source_dir, "site");
    assert_eq!(cfg.config.out_dir, "public");
    assert!(!cfg.reload.enabled);
    assert_eq!(cfg.reload.addr, "127.0.0.1:4100");

    Ok(())
}
