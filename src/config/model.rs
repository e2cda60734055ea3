// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// parallelism = 4
/// debounce_ms = 200
///
/// [reload]
/// addr = "127.0.0.1:35729"
///
/// [task.styles]
/// kind = "shell"
/// command = "sassc src/_styles/main.scss dist/assets/styles/main.css"
/// inputs = ["_styles/**/*.scss"]
/// out = "assets/styles"
/// ```
///
/// All sections are optional and have reasonable defaults, except that at
/// least one `[task.<name>]` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Live-reload settings from `[reload]`.
    #[serde(default)]
    pub reload: ReloadSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Constructed only through
/// [`ConfigFile::try_from`] on a [`RawConfigFile`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub reload: ReloadSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        reload: ReloadSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            reload,
            task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks running at once. `0` means unbounded: every
    /// ready task is fanned out immediately.
    #[serde(default)]
    pub parallelism: usize,

    /// Debounce window for coalescing bursts of file events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Where per-task input fingerprints are stored.
    #[serde(default)]
    pub fingerprint_storage: FingerprintStorageMode,

    /// Source tree root, relative to the config file.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Output tree root, relative to the config file.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_out_dir() -> String {
    "dist".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            parallelism: 0,
            debounce_ms: default_debounce_ms(),
            fingerprint_storage: FingerprintStorageMode::default(),
            source_dir: default_source_dir(),
            out_dir: default_out_dir(),
        }
    }
}

/// Mode for storing task input fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintStorageMode {
    /// Store fingerprints in a file (`.sitepipe/fingerprints`), so that
    /// freshness survives restarts.
    File,
    /// Store fingerprints in memory only (lost on restart).
    Memory,
}

impl Default for FingerprintStorageMode {
    fn default() -> Self {
        FingerprintStorageMode::Memory
    }
}

/// `[reload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadSection {
    /// Whether to run the live-reload server in watch mode.
    #[serde(default = "default_reload_enabled")]
    pub enabled: bool,

    /// Listen address for the live-reload server.
    #[serde(default = "default_reload_addr")]
    pub addr: String,
}

fn default_reload_enabled() -> bool {
    true
}

fn default_reload_addr() -> String {
    "127.0.0.1:35729".to_string()
}

impl Default for ReloadSection {
    fn default() -> Self {
        Self {
            enabled: default_reload_enabled(),
            addr: default_reload_addr(),
        }
    }
}

/// Which shipped transform a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Run a shell command (`command`) from the project root.
    Shell,
    /// Copy matched inputs into the task's output directory.
    Copy,
    /// Link a script module graph into one bundle (`entry` + `bundle`).
    Bundle,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Transform kind. Determines which of the optional fields below are
    /// required; see `config::validate`.
    pub kind: TaskKind,

    /// Shell command, required for `kind = "shell"`.
    #[serde(default)]
    pub command: Option<String>,

    /// Entry module (relative to `source_dir`), required for `kind = "bundle"`.
    #[serde(default)]
    pub entry: Option<String>,

    /// Bundle output file (relative to `out_dir`), required for `kind = "bundle"`.
    #[serde(default)]
    pub bundle: Option<String>,

    /// Prefix (relative to `source_dir`) stripped from copied paths before
    /// they are placed under `out`. Only meaningful for `kind = "copy"`.
    #[serde(default)]
    pub base: Option<String>,

    /// Input glob patterns, relative to `source_dir`. These drive both the
    /// freshness check and watch-mode triggering.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Glob patterns excluded from `inputs`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Output directory owned by this task, relative to `out_dir`.
    #[serde(default)]
    pub out: Option<String>,
}
