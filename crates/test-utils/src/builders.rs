#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use sitepipe::config::{
    ConfigFile, ConfigSection, RawConfigFile, ReloadSection, TaskConfig, TaskKind,
};
use sitepipe::dag::TaskSpec;
use sitepipe::errors::Result;
use sitepipe::transform::Transform;

use crate::fake::NoopTransform;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                reload: ReloadSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.config.parallelism = parallelism;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn with_source_dir(mut self, dir: &str) -> Self {
        self.config.config.source_dir = dir.to_string();
        self
    }

    pub fn with_out_dir(mut self, dir: &str) -> Self {
        self.config.config.out_dir = dir.to_string();
        self
    }

    /// Validate, panicking on failure. Use [`Self::try_build`] to assert on
    /// validation errors.
    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    fn with_kind(kind: TaskKind) -> Self {
        Self {
            task: TaskConfig {
                kind,
                command: None,
                entry: None,
                bundle: None,
                base: None,
                inputs: vec![],
                exclude: vec![],
                after: vec![],
                out: None,
            },
        }
    }

    pub fn shell(cmd: &str) -> Self {
        let mut b = Self::with_kind(TaskKind::Shell);
        b.task.command = Some(cmd.to_string());
        b
    }

    pub fn copy(out: &str) -> Self {
        let mut b = Self::with_kind(TaskKind::Copy);
        b.task.out = Some(out.to_string());
        b
    }

    pub fn bundle(entry: &str, bundle: &str) -> Self {
        let mut b = Self::with_kind(TaskKind::Bundle);
        b.task.entry = Some(entry.to_string());
        b.task.bundle = Some(bundle.to_string());
        b
    }

    /// Escape hatch for validation tests that need a field missing.
    pub fn bare(kind: TaskKind) -> Self {
        Self::with_kind(kind)
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn out(mut self, dir: &str) -> Self {
        self.task.out = Some(dir.to_string());
        self
    }

    pub fn base(mut self, prefix: &str) -> Self {
        self.task.base = Some(prefix.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `dag::TaskSpec`, for tests that drive the scheduler without
/// any config file. The default action is a no-op transform that succeeds.
pub struct SpecBuilder {
    name: String,
    after: Vec<String>,
    inputs: Vec<String>,
    exclude: Vec<String>,
    dest: PathBuf,
    action: Arc<dyn Transform>,
}

impl SpecBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            after: vec![],
            inputs: vec![],
            exclude: vec![],
            dest: PathBuf::from("dist"),
            action: Arc::new(NoopTransform),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.after.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.inputs.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn action(mut self, action: Arc<dyn Transform>) -> Self {
        self.action = action;
        self
    }

    pub fn build(self) -> TaskSpec {
        TaskSpec {
            name: self.name,
            after: self.after,
            inputs: self.inputs,
            exclude: self.exclude,
            dest: self.dest,
            action: self.action,
        }
    }
}
