// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] maps the `Sitepipe.toml` file onto serde structs.
//! - [`loader`] reads a file and produces a validated [`model::ConfigFile`].
//! - [`validate`] holds the semantic checks (per-kind fields, glob syntax,
//!   unknown dependencies, DAG acyclicity).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, FingerprintStorageMode, RawConfigFile, ReloadSection, TaskConfig,
    TaskKind,
};
